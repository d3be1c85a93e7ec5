use crate::bbox::BoundingBox;
use crate::error::M2mError;
use crate::m2m::{self, M2mOps, SCENE_SEARCH};
use crate::selection::DatasetSelection;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

const UNKNOWN_SCENE: &str = "UnknownScene";

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    pub entity_id: String,
    pub display_id: Option<String>,
}

impl Scene {
    pub fn name(&self) -> &str {
        self.display_id.as_deref().unwrap_or(UNKNOWN_SCENE)
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct SearchData {
    results: Option<Vec<Scene>>,
    total_hits: Option<u64>,
}

pub fn search_payload(selection: &DatasetSelection, bbox: &BoundingBox) -> Value {
    json!({
        "datasetName": selection.dataset_name,
        "node": selection.node,
        "maxResults": selection.max_results,
        "sortOrder": "ASC",
        "startingNumber": 1,
        "sceneFilter": {
            "spatialFilter": bbox.to_spatial_filter(),
        },
    })
}

/// Runs a single `scene-search` for scenes intersecting `bbox`.
///
/// A response without a `results` list is treated as malformed; an empty list is not.
pub async fn search_scenes(
    ops: &impl M2mOps,
    selection: &DatasetSelection,
    bbox: &BoundingBox,
) -> Result<Vec<Scene>> {
    info!(
        "Searching for dataset {} in bbox: {}",
        selection.dataset_name, bbox
    );
    let payload = search_payload(selection, bbox);
    let data: SearchData = m2m::call(ops, SCENE_SEARCH, &payload)
        .await?
        .ok_or_else(|| M2mError::UnexpectedResponse {
            endpoint: SCENE_SEARCH.to_string(),
            detail: "missing 'data'".to_string(),
        })?;

    let mut scenes = data.results.ok_or_else(|| M2mError::UnexpectedResponse {
        endpoint: SCENE_SEARCH.to_string(),
        detail: "missing 'results'".to_string(),
    })?;

    if let Some(total_hits) = data.total_hits {
        info!("Catalog reports {} matching scene(s)", total_hits);
    }
    scenes.truncate(selection.max_results as usize);
    Ok(scenes)
}
