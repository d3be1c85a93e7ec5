use crate::error::M2mError;
use crate::m2m::{self, M2mOps, DOWNLOAD_OPTIONS, DOWNLOAD_REQUEST};
use crate::search::Scene;
use crate::selection::DatasetSelection;
use anyhow::Result;
use futures_util::TryStreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fs;
use std::fs::File;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tracing::{error, info, warn};

const FILE_EXTENSION: &str = "tif";

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DownloadOption {
    pub id: String,
    pub available: Option<bool>,
    pub product_name: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct AvailableDownload {
    pub url: String,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRequestResult {
    #[serde(default)]
    pub available_downloads: Vec<AvailableDownload>,
    #[serde(default)]
    pub preparing_downloads: Vec<Value>,
}

/// What happened to a single scene.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SceneOutcome {
    Downloaded { path: PathBuf, bytes: u64 },
    NoOptions,
    NoAvailableProduct,
    NotStaged,
    Preparing { downloads: Vec<Value> },
    Failed { reason: String },
}

/// `<out_dir>/<entityId>.tif`, refusing ids that would resolve outside `out_dir`.
pub fn output_path(out_dir: &Path, entity_id: &str) -> Result<PathBuf> {
    let file_name = format!("{}.{}", entity_id, FILE_EXTENSION);
    let mut components = Path::new(&file_name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if !entity_id.is_empty() => {
            Ok(out_dir.join(file_name))
        }
        _ => Err(M2mError::UnsafeEntityId(entity_id.to_string()).into()),
    }
}

/// Picks the first option the service marks as available.
pub fn select_product(options: &[DownloadOption]) -> Option<&DownloadOption> {
    options.iter().find(|o| o.available == Some(true))
}

/// Requests download options for `scene`, stages the first available product and, if the
/// service hands back a link right away, streams it to `<out_dir>/<entityId>.tif`.
pub async fn download_scene(
    ops: &impl M2mOps,
    selection: &DatasetSelection,
    scene: &Scene,
    out_dir: &Path,
) -> Result<SceneOutcome> {
    let entity_id = scene.entity_id.as_str();
    let dst = output_path(out_dir, entity_id)?;

    let payload = json!({
        "datasetName": selection.dataset_name,
        "node": selection.node,
        "entityIds": [entity_id],
    });
    let options: Option<Vec<DownloadOption>> = m2m::call(ops, DOWNLOAD_OPTIONS, &payload).await?;
    let Some(options) = options else {
        warn!("No download options returned for scene: {}", entity_id);
        return Ok(SceneOutcome::NoOptions);
    };

    let Some(product) = select_product(&options) else {
        warn!("No available products for scene: {}", entity_id);
        return Ok(SceneOutcome::NoAvailableProduct);
    };
    if let Some(name) = &product.product_name {
        info!("Selected product {} ({})", product.id, name);
    }

    let payload = json!({
        "downloads": [{
            "datasetName": selection.dataset_name,
            "entityId": entity_id,
            "productId": product.id,
            "node": selection.node,
        }],
    });
    let staged: Option<DownloadRequestResult> =
        m2m::call(ops, DOWNLOAD_REQUEST, &payload).await?;
    let Some(staged) = staged else {
        error!("Could not stage download for scene: {}", entity_id);
        return Ok(SceneOutcome::NotStaged);
    };

    let Some(download) = staged.available_downloads.first() else {
        info!("Download is being prepared; no immediate link available.");
        if !staged.preparing_downloads.is_empty() {
            let preparing = serde_json::to_string(&staged.preparing_downloads)?;
            info!("Scenes in 'preparing' status: {}", preparing);
        }
        return Ok(SceneOutcome::Preparing {
            downloads: staged.preparing_downloads,
        });
    };

    info!("Downloading scene to: {}", dst.display());
    let bytes = try_download(ops, &download.url, &dst).await?;
    info!("Download complete: {}", dst.display());

    Ok(SceneOutcome::Downloaded { path: dst, bytes })
}

/// Streams `url` into `dst`, going through a `.partial` file that is renamed once the body
/// has been fully written. Returns the number of bytes written.
pub async fn try_download(ops: &impl M2mOps, url: &str, dst: &Path) -> Result<u64> {
    if let Some(parent_dir) = dst.parent() {
        if !parent_dir.exists() {
            fs::create_dir_all(parent_dir)?;
        }
    }

    let partial = partial_path(dst);
    match write_stream(ops, url, &partial).await {
        Ok(byte_count) => {
            fs::rename(&partial, dst)?;
            Ok(byte_count)
        }
        Err(e) => {
            let _ = fs::remove_file(&partial);
            Err(e)
        }
    }
}

async fn write_stream(ops: &impl M2mOps, url: &str, partial: &Path) -> Result<u64> {
    let mut response = ops.get_stream(url).await?;
    let mut partial_file = File::create(partial)?;
    let mut byte_count = 0;

    while let Some(bytes) = response.try_next().await? {
        partial_file.write_all(&bytes)?;
        byte_count += bytes.len() as u64;
    }
    partial_file.flush()?;
    Ok(byte_count)
}

fn partial_path(dst: &Path) -> PathBuf {
    let mut name = dst.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}
