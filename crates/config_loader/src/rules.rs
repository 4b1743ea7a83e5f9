//! Configuration validation
//!
//! Rules:
//! - view ids unique and non-empty, frame_rate > 0
//! - crop bounds ordered
//! - ref_view declared, ref_crop defined on it (unless "default")
//! - numeric ranges of the sync section (validator derive)
//! - pipeline stages unique
//! - recordings uniquely named (also after path escaping), sources only for
//!   declared views, reference source present, analog windows ordered
//! - sink names unique and non-empty

use std::collections::{HashMap, HashSet};

use contracts::{
    path_safe_name, ContractError, RigBlueprint, SignalKind, SourceConfig, DEFAULT_CROP,
};
use validator::Validate;

/// Validate a RigBlueprint
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(blueprint: &RigBlueprint) -> Result<(), ContractError> {
    validate_view_ids(blueprint)?;
    validate_view_rates(blueprint)?;
    validate_crops(blueprint)?;
    validate_sync_ranges(blueprint)?;
    validate_pipeline(blueprint)?;
    validate_reference(blueprint)?;
    validate_recordings(blueprint)?;
    validate_sinks(blueprint)?;
    Ok(())
}

/// View ids: non-empty and unique
fn validate_view_ids(blueprint: &RigBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, view) in blueprint.views.iter().enumerate() {
        if view.id.is_empty() {
            return Err(ContractError::config_validation(
                format!("views[{idx}].id"),
                "view id cannot be empty",
            ));
        }
        if !seen.insert(&view.id) {
            return Err(ContractError::config_validation(
                format!("views[id={}]", view.id),
                "duplicate view id",
            ));
        }
    }
    Ok(())
}

/// Frame rates and thresholds
fn validate_view_rates(blueprint: &RigBlueprint) -> Result<(), ContractError> {
    for view in &blueprint.views {
        if !(view.frame_rate > 0.0 && view.frame_rate.is_finite()) {
            return Err(ContractError::config_validation(
                format!("views[{}].frame_rate", view.id),
                format!("frame_rate must be > 0, got {}", view.frame_rate),
            ));
        }
        if let Some(threshold) = view.threshold {
            let in_range = match view.signal {
                SignalKind::Brightness => (0.0..=1.0).contains(&threshold),
                SignalKind::Analog => threshold.is_finite(),
            };
            if !in_range {
                return Err(ContractError::config_validation(
                    format!("views[{}].threshold", view.id),
                    format!("threshold {threshold} out of range for {:?} signal", view.signal),
                ));
            }
        }
    }
    Ok(())
}

/// Crop bounds must be ordered
fn validate_crops(blueprint: &RigBlueprint) -> Result<(), ContractError> {
    for view in &blueprint.views {
        if !view.crop.is_ordered() {
            return Err(ContractError::config_validation(
                format!("views[{}].crop", view.id),
                "crop start must be < end",
            ));
        }
        for (name, crop) in &view.extra_crops {
            if !crop.is_ordered() {
                return Err(ContractError::config_validation(
                    format!("views[{}].extra_crops.{name}", view.id),
                    "crop start must be < end",
                ));
            }
        }
    }
    Ok(())
}

/// Numeric ranges declared on `SyncSettings`
fn validate_sync_ranges(blueprint: &RigBlueprint) -> Result<(), ContractError> {
    let Err(errors) = blueprint.sync.validate() else {
        return Ok(());
    };

    let mut problems: Vec<(String, String)> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |err| {
                let message = match err.params.get("value") {
                    Some(value) => format!("value {value} fails '{}' check", err.code),
                    None => format!("fails '{}' check", err.code),
                };
                (format!("sync.{field}"), message)
            })
        })
        .collect();
    problems.sort();

    let (field, message) = problems
        .into_iter()
        .next()
        .unwrap_or_else(|| ("sync".to_string(), errors.to_string()));
    Err(ContractError::config_validation(field, message))
}

/// Pipeline stages must not repeat
fn validate_pipeline(blueprint: &RigBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for stage in &blueprint.sync.pipeline {
        if !seen.insert(*stage) {
            return Err(ContractError::config_validation(
                "sync.pipeline",
                format!("duplicate stage '{}'", stage.method()),
            ));
        }
    }
    Ok(())
}

/// ref_view declared, ref_crop defined on it
fn validate_reference(blueprint: &RigBlueprint) -> Result<(), ContractError> {
    let sync = &blueprint.sync;
    let Some(reference) = blueprint.view(&sync.ref_view) else {
        return Err(ContractError::config_validation(
            "sync.ref_view",
            format!("ref_view '{}' not found in views", sync.ref_view),
        ));
    };

    if reference.signal == SignalKind::Brightness
        && sync.ref_crop != DEFAULT_CROP
        && !reference.extra_crops.contains_key(&sync.ref_crop)
    {
        return Err(ContractError::config_validation(
            "sync.ref_crop",
            format!(
                "crop '{}' not defined on reference view '{}'",
                sync.ref_crop, sync.ref_view
            ),
        ));
    }
    Ok(())
}

/// Recordings: unique names, known views, reference source present
fn validate_recordings(blueprint: &RigBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    let mut folders: HashMap<String, &str> = HashMap::new();
    for (idx, recording) in blueprint.recordings.iter().enumerate() {
        if recording.name.is_empty() {
            return Err(ContractError::config_validation(
                format!("recordings[{idx}].name"),
                "recording name cannot be empty",
            ));
        }
        if !seen.insert(recording.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("recordings[name={}]", recording.name),
                "duplicate recording name",
            ));
        }
        if let Some(other) = folders.insert(path_safe_name(&recording.name), &recording.name) {
            return Err(ContractError::config_validation(
                format!("recordings[name={}]", recording.name),
                format!("output folder collides with recording '{other}'"),
            ));
        }
        for (view, source) in &recording.sources {
            if blueprint.view(view).is_none() {
                return Err(ContractError::config_validation(
                    format!("recordings[{}].sources.{view}", recording.name),
                    format!("source for undeclared view '{view}'"),
                ));
            }
            validate_analog_window(&recording.name, view, source)?;
        }
        if !recording.sources.contains_key(&blueprint.sync.ref_view) {
            return Err(ContractError::config_validation(
                format!("recordings[{}].sources", recording.name),
                format!("missing source for reference view '{}'", blueprint.sync.ref_view),
            ));
        }
    }
    Ok(())
}

/// Analog slice bounds: non-negative start, end after start
fn validate_analog_window(
    recording: &str,
    view: &str,
    source: &SourceConfig,
) -> Result<(), ContractError> {
    let SourceConfig::AnalogTrace {
        time_start,
        time_end,
        ..
    } = source
    else {
        return Ok(());
    };
    let field = format!("recordings[{recording}].sources.{view}");
    if let Some(start) = time_start {
        if !(start.is_finite() && *start >= 0.0) {
            return Err(ContractError::config_validation(
                format!("{field}.time_start"),
                format!("time_start must be >= 0, got {start}"),
            ));
        }
    }
    if let Some(end) = time_end {
        let start = time_start.unwrap_or(0.0);
        if !(end.is_finite() && *end > start) {
            return Err(ContractError::config_validation(
                format!("{field}.time_end"),
                format!("time_end must be > {start}, got {end}"),
            ));
        }
    }
    Ok(())
}

/// Sinks: unique non-empty names
fn validate_sinks(blueprint: &RigBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, sink) in blueprint.sinks.iter().enumerate() {
        if sink.name.is_empty() {
            return Err(ContractError::config_validation(
                format!("sinks[{}].name", idx),
                "sink name cannot be empty",
            ));
        }
        if !seen.insert(sink.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("sinks[name={}]", sink.name),
                "duplicate sink name",
            ));
        }
    }
    Ok(())
}
