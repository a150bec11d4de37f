//! Copedent JSON loading and saving

use std::fs;
use std::path::Path;

use steel_core::{Copedent, SteelError};
use tracing::{debug, warn};

use crate::error::Result;

/// Parse a copedent from JSON. Structural problems other than an empty
/// string list are logged and left to fail closed during search.
pub fn parse_copedent(json: &str) -> Result<Copedent> {
    let copedent: Copedent = serde_json::from_str(json)?;
    if copedent.strings.is_empty() {
        return Err(SteelError::InvalidCopedent(format!("{} has no strings", copedent.id)).into());
    }
    let problems = copedent.validate();
    if !problems.is_empty() {
        warn!(copedent = %copedent.id, count = problems.len(), "Copedent loaded with problems");
    }
    Ok(copedent)
}

pub fn load_copedent(path: &Path) -> Result<Copedent> {
    let json = fs::read_to_string(path)?;
    let copedent = parse_copedent(&json)?;
    debug!(path = %path.display(), id = %copedent.id, "Loaded copedent");
    Ok(copedent)
}

pub fn save_copedent(copedent: &Copedent, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(copedent)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use steel_core::{Pitch, PitchClass, SplitResolution};

    const LAP_STEEL: &str = r#"{
        "id": "c6-lap",
        "name": "C6 lap steel",
        "strings": [
            {"id": 1, "open": "E4"},
            {"id": 2, "open": "C4"},
            {"id": 3, "open": "A3"},
            {"id": 4, "open": "G3"}
        ],
        "pedals": [
            {"id": "P1", "name": "A", "changes": {"2": 1}}
        ],
        "levers": [
            {"id": "LKL", "name": "LKL", "knee": "left", "direction": "left", "changes": {"1": 1}}
        ],
        "splits": [
            {"string_id": 2, "controls": ["P1", "LKL"], "resolution": {"policy": "include", "net_change": 2}}
        ]
    }"#;

    #[test]
    fn test_parse_json_shape() {
        let copedent = parse_copedent(LAP_STEEL).unwrap();
        assert_eq!(copedent.strings.len(), 4);
        assert_eq!(copedent.string(3).map(|s| s.open), Some(Pitch::new(PitchClass::A, 3)));
        assert_eq!(copedent.change("P1", 2), Some(1));
        assert!(copedent.lever("LKL").is_some_and(|l| l.enabled));
        assert!(copedent.mechanisms.is_empty());
        assert_eq!(
            copedent.splits[0].resolution,
            SplitResolution::Include { net_change: 2 }
        );
    }

    #[test]
    fn test_round_trip_standard_e9() {
        let e9 = Copedent::standard_e9();
        let json = serde_json::to_string(&e9).unwrap();
        assert_eq!(parse_copedent(&json).unwrap(), e9);
    }

    #[test]
    fn test_rejects_empty_and_malformed() {
        let empty = r#"{"id": "x", "name": "x", "strings": []}"#;
        assert!(matches!(
            parse_copedent(empty),
            Err(ServiceError::Core(SteelError::InvalidCopedent(_)))
        ));
        assert!(matches!(parse_copedent("{"), Err(ServiceError::Json(_))));
        let bad_pitch = r#"{"id": "x", "name": "x", "strings": [{"id": 1, "open": "H4"}]}"#;
        assert!(matches!(parse_copedent(bad_pitch), Err(ServiceError::Json(_))));
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("steelvoice-test-{}", std::process::id()));
        let path = dir.join("e9.json");
        let e9 = Copedent::standard_e9();
        save_copedent(&e9, &path).unwrap();
        assert_eq!(load_copedent(&path).unwrap(), e9);
        let _ = fs::remove_dir_all(&dir);
    }
}
