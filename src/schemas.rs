//! Decoders for raw WPILOG entries whose type tag names a known binary schema.
//!
//! The raw bytes are always stored under the entry's own key; a schema decoder
//! additionally expands them into typed child fields.

use anyhow::Result;
use byteorder::{BigEndian, ReadBytesExt};
use std::io::Cursor;

use crate::log::LogStore;

/// Expands one raw record into child fields of `key`.
pub type SchemaDecoder = fn(&mut LogStore, &str, f64, &[u8]) -> Result<()>;

pub fn find_schema_decoder(type_name: &str) -> Option<SchemaDecoder> {
    match type_name {
        "rawBytes" => Some(decode_pipeline_result),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Corner {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrackedTarget {
    pub yaw: f64,
    pub pitch: f64,
    pub area: f64,
    pub skew: f64,
    pub fiducial_id: i32,
    /// Translation (x, y, z) followed by quaternion (w, x, y, z)
    pub best_camera_to_target: Vec<f64>,
    pub alt_camera_to_target: Vec<f64>,
    pub pose_ambiguity: f64,
    pub min_area_rect_corners: Vec<Corner>,
    pub detected_corners: Vec<Corner>,
}

/// One vision pipeline result as published by the coprocessor.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PipelineResult {
    pub latency: f64,
    /// Capture time: record timestamp minus latency
    pub timestamp: f64,
    pub targets: Vec<TrackedTarget>,
}

fn read_corner(cursor: &mut Cursor<&[u8]>) -> Result<Corner> {
    let x = cursor.read_f64::<BigEndian>()?;
    let y = cursor.read_f64::<BigEndian>()?;
    Ok(Corner { x, y })
}

fn read_transform3d(cursor: &mut Cursor<&[u8]>) -> Result<Vec<f64>> {
    (0..7)
        .map(|_| cursor.read_f64::<BigEndian>().map_err(anyhow::Error::from))
        .collect()
}

pub fn parse_pipeline_result(data: &[u8], timestamp: f64) -> Result<PipelineResult> {
    let mut cursor = Cursor::new(data);

    let latency = cursor.read_f64::<BigEndian>()?;
    let num_targets = cursor.read_i8()?.max(0) as usize;

    let mut targets = Vec::with_capacity(num_targets);
    for _ in 0..num_targets {
        let yaw = cursor.read_f64::<BigEndian>()?;
        let pitch = cursor.read_f64::<BigEndian>()?;
        let area = cursor.read_f64::<BigEndian>()?;
        let skew = cursor.read_f64::<BigEndian>()?;
        let fiducial_id = cursor.read_i32::<BigEndian>()?;
        let best_camera_to_target = read_transform3d(&mut cursor)?;
        let alt_camera_to_target = read_transform3d(&mut cursor)?;
        let pose_ambiguity = cursor.read_f64::<BigEndian>()?;

        let min_area_rect_corners = (0..4)
            .map(|_| read_corner(&mut cursor))
            .collect::<Result<Vec<_>>>()?;
        let num_corners = cursor.read_i8()?.max(0) as usize;
        let detected_corners = (0..num_corners)
            .map(|_| read_corner(&mut cursor))
            .collect::<Result<Vec<_>>>()?;

        targets.push(TrackedTarget {
            yaw,
            pitch,
            area,
            skew,
            fiducial_id,
            best_camera_to_target,
            alt_camera_to_target,
            pose_ambiguity,
            min_area_rect_corners,
            detected_corners,
        });
    }

    Ok(PipelineResult {
        latency,
        timestamp: timestamp - latency,
        targets,
    })
}

fn put_corners(log: &mut LogStore, key: &str, timestamp: f64, corners: &[Corner]) {
    // Empty corner lists carry no element type and are not stored
    if corners.is_empty() {
        return;
    }
    log.put_number_array(
        &format!("{}_x", key),
        timestamp,
        corners.iter().map(|c| c.x).collect(),
    );
    log.put_number_array(
        &format!("{}_y", key),
        timestamp,
        corners.iter().map(|c| c.y).collect(),
    );
}

pub fn save_pipeline_result(log: &mut LogStore, base_key: &str, timestamp: f64, result: &PipelineResult) {
    log.put_number(&format!("{}/latency", base_key), timestamp, result.latency);
    log.put_number(&format!("{}/timestamp", base_key), timestamp, result.timestamp);

    for (idx, target) in result.targets.iter().enumerate() {
        let prefix = format!("{}/target_{}", base_key, idx);
        log.put_number(&format!("{}/yaw", prefix), timestamp, target.yaw);
        log.put_number(&format!("{}/pitch", prefix), timestamp, target.pitch);
        log.put_number(&format!("{}/area", prefix), timestamp, target.area);
        log.put_number(&format!("{}/skew", prefix), timestamp, target.skew);
        log.put_number(
            &format!("{}/fiducialId", prefix),
            timestamp,
            target.fiducial_id as f64,
        );
        log.put_number_array(
            &format!("{}/bestCameraToTarget", prefix),
            timestamp,
            target.best_camera_to_target.clone(),
        );
        log.put_number_array(
            &format!("{}/altCameraToTarget", prefix),
            timestamp,
            target.alt_camera_to_target.clone(),
        );
        log.put_number(
            &format!("{}/poseAmbiguity", prefix),
            timestamp,
            target.pose_ambiguity,
        );
        put_corners(
            log,
            &format!("{}/minAreaRectCorners", prefix),
            timestamp,
            &target.min_area_rect_corners,
        );
        put_corners(
            log,
            &format!("{}/detectedCorners", prefix),
            timestamp,
            &target.detected_corners,
        );
    }
}

fn decode_pipeline_result(log: &mut LogStore, key: &str, timestamp: f64, data: &[u8]) -> Result<()> {
    let result = parse_pipeline_result(data, timestamp)?;
    save_pipeline_result(log, key, timestamp, &result);
    Ok(())
}
