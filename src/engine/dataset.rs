//! Dataset download and predictions upload.

use std::path::{Path, PathBuf};
use tracing::info;

use super::poller::{upload_status, Clock, StatusPoller};
use crate::error::Result;
use crate::gateway::TournamentGateway;
use crate::types::{Credentials, SubmissionStatus};

/// Download the current dataset to `path`, overwriting it if present.
///
/// A leading `~/` is expanded to `$HOME`. Returns the path written.
pub async fn download_dataset(gateway: &dyn TournamentGateway, path: &Path) -> Result<PathBuf> {
    let dest = expand_home(path);
    info!(path = %dest.display(), "Downloading dataset");
    let url = gateway.get_dataset_url().await?;
    gateway.download_file(&url, &dest).await?;
    Ok(dest)
}

/// Upload a predictions file.
///
/// With `block` the call waits until scoring completes (see
/// [`StatusPoller`]); otherwise it returns whatever status is available
/// right after the upload. The token needs the read-submission scope
/// only when blocking.
pub async fn upload(
    gateway: &dyn TournamentGateway,
    clock: &dyn Clock,
    path: &Path,
    creds: &Credentials,
    block: bool,
    verbose: bool,
) -> Result<(String, SubmissionStatus)> {
    let path = expand_home(path);
    let upload_id = gateway.upload_predictions(&path, creds).await?;
    info!(upload_id = %upload_id, block, "Submission uploaded");

    let status = if block {
        StatusPoller::new(gateway, clock)
            .verbose(verbose)
            .wait(&upload_id, creds)
            .await?
            .status
    } else {
        upload_status(gateway, &upload_id, creds).await?
    };
    Ok((upload_id, status))
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), std::env::var_os("HOME")) {
        (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => path.to_path_buf(),
    }
}
