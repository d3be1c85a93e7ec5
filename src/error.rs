use thiserror::Error;

#[derive(Error, Debug)]
pub enum M2mError {
    #[error("Environment variable {0} is not set")]
    MissingToken(&'static str),

    #[error("Invalid bounding box ({min_lon}, {min_lat}, {max_lon}, {max_lat}): {reason}")]
    InvalidBoundingBox {
        min_lon: f64,
        min_lat: f64,
        max_lon: f64,
        max_lat: f64,
        reason: &'static str,
    },

    #[error("GeoJSON does not contain valid polygon geometry")]
    NoPolygonGeometry,

    #[error("Entity id {0:?} does not name a file inside the output directory")]
    UnsafeEntityId(String),

    #[error("M2M API error {code}: {message}")]
    Api { code: String, message: String },

    #[error("Unexpected {endpoint} response: {detail}")]
    UnexpectedResponse { endpoint: String, detail: String },
}
