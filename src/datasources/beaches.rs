use crate::error::{PescaError, Result};
use crate::models::BeachDatabase;
use std::path::Path;

const BUNDLED_BEACHES: &str = include_str!("../../data/beaches.yaml");

/// Bundled Espírito Santo dataset.
pub fn bundled() -> Result<BeachDatabase> {
    parse(BUNDLED_BEACHES)
}

/// Loads a beach database file, or the bundled one when no path is given.
pub fn load(path: Option<&Path>) -> Result<BeachDatabase> {
    let Some(path) = path else {
        return bundled();
    };

    let content = std::fs::read_to_string(path).map_err(|e| {
        PescaError::Config(format!("Failed to read beach database {:?}: {}", path, e))
    })?;
    let db = parse(&content)?;
    tracing::info!(
        "Loaded {} beaches from {}",
        db.all_beaches().len(),
        path.display()
    );
    Ok(db)
}

pub fn parse(content: &str) -> Result<BeachDatabase> {
    let db: BeachDatabase = serde_yaml::from_str(content)?;
    for beach in db.all_beaches() {
        let c = beach.beach.coordinates;
        if !(-90.0..=90.0).contains(&c.latitude) || !(-180.0..=180.0).contains(&c.longitude) {
            return Err(PescaError::InvalidData(format!(
                "{} has out-of-range coordinates {}",
                beach.label(),
                c
            )));
        }
    }
    Ok(db)
}
