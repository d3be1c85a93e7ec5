use crate::bbox::BoundingBox;
use crate::download::{download_scene, SceneOutcome};
use crate::m2m::M2mOps;
use crate::search::{search_scenes, Scene};
use crate::selection::DatasetSelection;
use anyhow::Result;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Serialize, Debug)]
pub struct SceneReport {
    pub scene: Scene,
    pub outcome: SceneOutcome,
}

#[derive(Serialize, Debug)]
pub struct RunSummary {
    pub dataset_name: String,
    pub bbox: BoundingBox,
    pub scenes: Vec<SceneReport>,
}

impl RunSummary {
    pub fn downloaded(&self) -> usize {
        self.scenes
            .iter()
            .filter(|r| matches!(r.outcome, SceneOutcome::Downloaded { .. }))
            .count()
    }

    /// Scenes the service is still preparing.
    pub fn pending(&self) -> Vec<&Scene> {
        self.scenes
            .iter()
            .filter(|r| matches!(r.outcome, SceneOutcome::Preparing { .. }))
            .map(|r| &r.scene)
            .collect()
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

/// Where the search area comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchArea {
    GeoJson(PathBuf),
    /// `min_lon min_lat max_lon max_lat`
    Literal(Vec<f64>),
}

impl SearchArea {
    pub fn resolve(&self) -> Result<BoundingBox> {
        match self {
            SearchArea::GeoJson(path) => {
                let bbox = BoundingBox::from_geojson_file(path)?;
                info!("Parsed bounding box from GeoJSON: {}", bbox);
                Ok(bbox)
            }
            SearchArea::Literal(values) => BoundingBox::from_slice(values),
        }
    }
}

/// Process exit status for a finished run: 0 on success (including no results), 1 otherwise.
pub fn exit_status<T>(result: &Result<T>) -> u8 {
    match result {
        Ok(_) => 0,
        Err(_) => 1,
    }
}

/// Resolves `area` and, only once it is valid, searches and downloads.
pub async fn execute(
    ops: &impl M2mOps,
    selection: &DatasetSelection,
    area: &SearchArea,
    out_dir: &Path,
) -> Result<RunSummary> {
    let bbox = area.resolve()?;
    run(ops, selection, &bbox, out_dir).await
}

/// Searches for scenes in `bbox` and downloads each one in turn.
///
/// Search failures abort the run. Failures while handling a single scene are logged and
/// recorded, and the run moves on to the next scene.
pub async fn run(
    ops: &impl M2mOps,
    selection: &DatasetSelection,
    bbox: &BoundingBox,
    out_dir: &Path,
) -> Result<RunSummary> {
    let scenes = search_scenes(ops, selection, bbox).await?;

    let mut summary = RunSummary {
        dataset_name: selection.dataset_name.clone(),
        bbox: *bbox,
        scenes: vec![],
    };

    if scenes.is_empty() {
        info!("No scenes found in the specified region.");
        return Ok(summary);
    }

    info!("Found {} scene(s).", scenes.len());

    for (idx, scene) in scenes.into_iter().enumerate() {
        info!(
            "  {}. Scene ID: {}  Name: {}",
            idx + 1,
            scene.entity_id,
            scene.name()
        );

        let outcome = match download_scene(ops, selection, &scene, out_dir).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Skipping scene {}: {:#}", scene.entity_id, e);
                SceneOutcome::Failed {
                    reason: format!("{:#}", e),
                }
            }
        };
        summary.scenes.push(SceneReport { scene, outcome });
    }

    let pending = summary.pending();
    if !pending.is_empty() {
        let ids = pending
            .iter()
            .map(|s| s.entity_id.as_str())
            .collect::<Vec<_>>();
        info!("Still preparing, run again later for: {}", ids.join(", "));
    }
    info!(
        "Downloaded {} of {} scene(s)",
        summary.downloaded(),
        summary.scenes.len()
    );

    Ok(summary)
}
