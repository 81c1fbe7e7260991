/// Archive downloads for `Data` query results
use super::{ApiClient, Transport};
use crate::resources::{Data, DataFile, Resource};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

fn expand_home(dir: &Path) -> PathBuf {
    match dir.strip_prefix("~") {
        Ok(rest) => match std::env::var_os("HOME") {
            Some(home) => PathBuf::from(home).join(rest),
            None => dir.to_path_buf(),
        },
        Err(_) => dir.to_path_buf(),
    }
}

fn absolute(dir: PathBuf) -> PathBuf {
    if dir.is_absolute() {
        return dir;
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(dir),
        Err(_) => dir,
    }
}

impl<T: Transport> ApiClient<T> {
    /// Download every file listed in `data.entries` into `data.outdir`.
    pub async fn download(&self, data: &mut Data) -> bool {
        self.download_with_progress(data, |_, _, _| {}).await
    }

    /// As [`ApiClient::download`], calling `progress(file, index, total)`
    /// before each file is fetched. Files are fetched one at a time.
    pub async fn download_with_progress<F>(&self, data: &mut Data, mut progress: F) -> bool
    where
        F: FnMut(&DataFile, usize, usize),
    {
        if data.entries.is_empty() {
            let obsid = data
                .obsid
                .map(|id| id.archive())
                .unwrap_or_else(|| "None".to_string());
            data.status_mut().error(format!("No data found for {}.", obsid));
            return false;
        }

        data.outdir = absolute(expand_home(&data.outdir));
        let aws = data.uses_aws();
        let total = data.entries.len();

        for index in 0..total {
            let file = data.entries[index].clone();
            let dest = data.local_path(&file);

            if !data.clobber && dest.exists() {
                let message = format!(
                    "{} exists and not overwritten (set clobber to override this).",
                    file.filename
                );
                warn!("{}", message);
                data.status_mut().warning(message);
                data.entries[index].localpath = Some(dest);
                continue;
            }

            progress(&file, index, total);
            let url = file.source_url(aws);
            match self.transport.download(&url, &dest).await {
                Ok(bytes) => {
                    info!(file = %file.filename, bytes, "downloaded {}", url);
                    data.entries[index].localpath = Some(dest);
                }
                Err(e) => {
                    warn!(file = %file.filename, "download failed: {}", e);
                    data.status_mut()
                        .error(format!("Error downloading {}", file.filename));
                    return false;
                }
            }
        }
        true
    }
}
