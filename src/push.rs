//! `PushDriver` (spec §4.11, §6.5): submits a tiered build order to a
//! remote build controller, strictly sequentially.
//!
//! Grounded on `original_source/push/{commands,job}.go`'s `Publish`/`Query`
//! (git push via subprocess gated on `HEAD == main`, SSH subprocess
//! invoking `build`/`query <id>`, JSON `Job` response) and the commented
//! polling loop at the bottom of `original_source/cmd/push.go` for the
//! backoff durations. Uses `git2` (teacher's stack) for the HEAD/branch
//! check and `tokio::process::Command` (teacher's stack) for the
//! `git push`/`ssh` subprocesses, since `go-git`'s inability to pick up
//! the caller's SSH agent — noted in the original's own comment — is
//! exactly why it shells out for the actual push too.
use std::time::Duration;

use camino::Utf8Path;
use serde::Deserialize;
use tokio::process::Command;

use crate::error::ExternalError;
use crate::model::Package;

const UNCLAIMED_POLL: Duration = Duration::from_secs(1);
const CLAIMED_POLL: Duration = Duration::from_secs(1);
const BUILDING_POLL: Duration = Duration::from_secs(15);

/// A job's lifecycle status as reported by the remote controller (spec
/// §4.11, §6.5). Mirrors the teacher's `ConcreteArchitecture`
/// (`source_info.rs`) shape: a closed set of known values plus a
/// `#[strum(default)]` catch-all that preserves whatever string the
/// controller actually sent, since spec §4.11 treats "any unknown value"
/// as fatal rather than rejecting the response outright.
#[derive(Debug, Clone, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "UPPERCASE")]
pub enum JobStatus {
    Unclaimed,
    Claimed,
    Building,
    Ok,
    Failed,
    #[strum(default, to_string = "{0}")]
    Unknown(String),
}

impl<'de> Deserialize<'de> for JobStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(raw.parse().unwrap_or(JobStatus::Unknown(raw)))
    }
}

/// A job as reported by the remote controller (spec §6.5).
#[derive(Debug, Clone, Deserialize)]
pub struct Job {
    pub id: u64,
    pub pkg: String,
    pub tag: String,
    pub status: JobStatus,
    pub builder: String,
    #[serde(default)]
    pub finished: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(rename = "ref", default)]
    pub git_ref: Option<String>,
}

impl Job {
    fn is_terminal(&self) -> bool {
        !matches!(self.status, JobStatus::Unclaimed | JobStatus::Claimed | JobStatus::Building)
    }

    fn poll_delay(&self) -> Duration {
        match self.status {
            JobStatus::Unclaimed => UNCLAIMED_POLL,
            JobStatus::Claimed => CLAIMED_POLL,
            _ => BUILDING_POLL,
        }
    }
}

/// Drives package submission against `<user>@<host>`.
pub struct PushDriver {
    user: String,
    host: String,
    dry_run: bool,
    git_push: bool,
}

impl PushDriver {
    pub fn new(user: impl Into<String>, host: impl Into<String>, dry_run: bool, git_push: bool) -> Self {
        PushDriver {
            user: user.into(),
            host: host.into(),
            dry_run,
            git_push,
        }
    }

    /// Submit `order` strictly sequentially: the k+1-th package is not
    /// submitted until the k-th reaches `OK` (spec §4.11 step 4). The
    /// first non-`OK` terminal status aborts the remaining queue without
    /// cancelling what was already submitted.
    pub async fn push_all(&self, order: &[Package]) -> Result<(), ExternalError> {
        for pkg in order {
            tracing::info!(package = %pkg.primary_name(), "submitting package");
            let job = self.publish(pkg).await?;
            let final_job = self.await_completion(job).await?;
            if final_job.status != JobStatus::Ok {
                return Err(ExternalError::RemoteCommand(format!(
                    "{} terminated with status {}",
                    pkg.primary_name(),
                    final_job.status
                )));
            }
        }
        Ok(())
    }

    async fn publish(&self, pkg: &Package) -> Result<Job, ExternalError> {
        if self.git_push && !self.dry_run {
            ensure_on_main(&pkg.root)?;
            run_git_push(&pkg.root).await?;
        }

        let relative_path = pkg
            .path
            .strip_prefix(&pkg.root)
            .unwrap_or(pkg.path.as_path());
        let commit = head_commit_hash(&pkg.root)?;
        let tag = format!("{}-{}-{}", pkg.primary_name(), pkg.version, pkg.release);

        if self.dry_run {
            tracing::info!(package = %pkg.primary_name(), "dry run: would submit build job");
            return Ok(Job {
                id: 0,
                pkg: pkg.primary_name().to_string(),
                tag,
                status: JobStatus::Ok,
                builder: "dry-run".to_string(),
                finished: None,
                path: None,
                git_ref: None,
            });
        }

        let output = self
            .ssh(&[
                "build",
                pkg.primary_name(),
                &tag,
                relative_path.as_str(),
                &commit,
                "by recipeforge",
            ])
            .await?;
        serde_json::from_slice(&output).map_err(|source| ExternalError::RemoteCommand(source.to_string()))
    }

    async fn await_completion(&self, mut job: Job) -> Result<Job, ExternalError> {
        if self.dry_run {
            return Ok(job);
        }
        while !job.is_terminal() {
            tokio::time::sleep(job.poll_delay()).await;
            job = self.query(job.id).await?;
        }
        Ok(job)
    }

    async fn query(&self, job_id: u64) -> Result<Job, ExternalError> {
        let output = self.ssh(&["query", &job_id.to_string()]).await?;
        serde_json::from_slice(&output).map_err(|source| ExternalError::RemoteCommand(source.to_string()))
    }

    async fn ssh(&self, args: &[&str]) -> Result<Vec<u8>, ExternalError> {
        let destination = format!("{}@{}", self.user, self.host);
        let mut command = Command::new("ssh");
        command.arg(&destination).args(args);

        let output = command
            .output()
            .await
            .map_err(|e| ExternalError::RemoteCommand(e.to_string()))?;

        if !output.status.success() {
            return Err(ExternalError::RemoteCommand(String::from_utf8_lossy(&output.stderr).into_owned()));
        }

        Ok(output.stdout)
    }
}

fn ensure_on_main(root: &Utf8Path) -> Result<(), ExternalError> {
    let repo = git2::Repository::open(root)?;
    let head = repo.head()?;
    if head.shorthand() != Some("main") {
        return Err(ExternalError::RemoteCommand(format!(
            "{root}: HEAD is not on main, refusing to push"
        )));
    }
    Ok(())
}

fn head_commit_hash(root: &Utf8Path) -> Result<String, ExternalError> {
    let repo = git2::Repository::open(root)?;
    let head = repo.head()?;
    let oid = head.target().ok_or_else(|| ExternalError::RemoteCommand(format!("{root}: unborn HEAD")))?;
    Ok(oid.to_string())
}

async fn run_git_push(root: &Utf8Path) -> Result<(), ExternalError> {
    let output = Command::new("git")
        .arg("push")
        .current_dir(root)
        .output()
        .await
        .map_err(|e| ExternalError::RemoteCommand(e.to_string()))?;
    if !output.status.success() {
        return Err(ExternalError::RemoteCommand(String::from_utf8_lossy(&output.stderr).into_owned()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(status: JobStatus) -> Job {
        Job {
            id: 1,
            pkg: "foo".into(),
            tag: "foo-1-1".into(),
            status,
            builder: String::new(),
            finished: None,
            path: None,
            git_ref: None,
        }
    }

    #[test]
    fn status_round_trips_through_strum() {
        assert_eq!("UNCLAIMED".parse::<JobStatus>().unwrap(), JobStatus::Unclaimed);
        assert_eq!("BUILDING".parse::<JobStatus>().unwrap(), JobStatus::Building);
        assert_eq!(
            "WEIRD".parse::<JobStatus>().unwrap(),
            JobStatus::Unknown("WEIRD".to_string())
        );
        assert_eq!(JobStatus::Ok.to_string(), "OK");
    }

    #[test]
    fn unclaimed_and_claimed_poll_every_second() {
        let unclaimed = job(JobStatus::Unclaimed);
        assert_eq!(unclaimed.poll_delay(), Duration::from_secs(1));
        assert!(!unclaimed.is_terminal());
    }

    #[test]
    fn building_polls_every_fifteen_seconds() {
        let building = job(JobStatus::Building);
        assert_eq!(building.poll_delay(), Duration::from_secs(15));
        assert!(!building.is_terminal());
    }

    #[test]
    fn ok_and_unknown_statuses_are_terminal() {
        assert!(job(JobStatus::Ok).is_terminal());
        assert!(job(JobStatus::Unknown("WEIRD".to_string())).is_terminal());
    }
}
