use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    AccessibilityRating, AnalysisId, AnalysisStatus, BarrierId, BarrierSeverity, BarrierType,
    Difficulty, DistanceEstimate, GuideId, ImageId, ProfileId, ScanId, ScanStatus, SpaceType,
    WheelchairType,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScanSummary {
    pub id: ScanId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    pub status: ScanStatus,
    pub image_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScanDetail {
    #[serde(flatten)]
    pub scan: ScanSummary,
    #[serde(default)]
    pub images: Vec<ImageInfo>,
    #[serde(default)]
    pub analysis_result: Option<AnalysisResultSummary>,
    #[serde(default)]
    pub has_guide: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanCreate {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanListQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ScanStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageInfo {
    pub id: ImageId,
    pub filename: String,
    pub original_filename: String,
    pub file_size: u64,
    pub mime_type: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    pub sequence_order: u32,
    #[serde(default)]
    pub user_description: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub barrier_count: u32,
    pub url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ImageUploadResponse {
    pub uploaded: u32,
    pub failed: u32,
    #[serde(default)]
    pub images: Vec<ImageInfo>,
    #[serde(default)]
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisResultSummary {
    pub status: AnalysisStatus,
    pub total_barriers_found: u32,
    #[serde(default)]
    pub accessibility_score: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartAnalysisRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wheelchair_profile_id: Option<ProfileId>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub force: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisResponse {
    pub id: AnalysisId,
    pub scan_id: ScanId,
    pub status: AnalysisStatus,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub total_images_analyzed: u32,
    #[serde(default)]
    pub total_barriers_found: u32,
    /// `None` until computed; 0..=100 when present.
    #[serde(default)]
    pub accessibility_score: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BarrierFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<BarrierSeverity>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub barrier_type: Option<BarrierType>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct EstimatedDimensions {
    pub width_cm: Option<f64>,
    pub height_cm: Option<f64>,
    pub depth_cm: Option<f64>,
}

/// Full barrier record as returned by the analysis endpoints. Geometry and
/// dimensions arrive as flat nullable columns; use [`Barrier::bounding_box`]
/// and [`Barrier::dimensions`] for the grouped view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Barrier {
    pub id: BarrierId,
    pub image_id: ImageId,
    pub barrier_type: BarrierType,
    pub severity: BarrierSeverity,
    pub description: String,
    #[serde(default)]
    pub bbox_x: Option<f64>,
    #[serde(default)]
    pub bbox_y: Option<f64>,
    #[serde(default)]
    pub bbox_width: Option<f64>,
    #[serde(default)]
    pub bbox_height: Option<f64>,
    #[serde(default)]
    pub estimated_width_cm: Option<f64>,
    #[serde(default)]
    pub estimated_height_cm: Option<f64>,
    #[serde(default)]
    pub estimated_depth_cm: Option<f64>,
    #[serde(default)]
    pub recommendation: Option<String>,
    pub confidence: f64,
}

impl Barrier {
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        Some(BoundingBox {
            x: self.bbox_x?,
            y: self.bbox_y?,
            width: self.bbox_width?,
            height: self.bbox_height?,
        })
    }

    pub fn dimensions(&self) -> Option<EstimatedDimensions> {
        let dims = EstimatedDimensions {
            width_cm: self.estimated_width_cm,
            height_cm: self.estimated_height_cm,
            depth_cm: self.estimated_depth_cm,
        };
        if dims == EstimatedDimensions::default() {
            None
        } else {
            Some(dims)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BarrierSummary {
    pub id: BarrierId,
    pub barrier_type: BarrierType,
    pub severity: BarrierSeverity,
    pub description: String,
    #[serde(default)]
    pub recommendation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NavigationStep {
    pub step_number: u32,
    pub image_id: ImageId,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub barriers: Vec<BarrierSummary>,
    #[serde(default)]
    pub alerts: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    pub accessibility_rating: AccessibilityRating,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Guide {
    pub id: GuideId,
    pub scan_id: ScanId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub accessibility_score: Option<f64>,
    #[serde(default)]
    pub navigation_steps: Vec<NavigationStep>,
    #[serde(default)]
    pub critical_alerts: Vec<String>,
    #[serde(default)]
    pub wheelchair_profile: Option<WheelchairProfile>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateGuideRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wheelchair_profile_id: Option<ProfileId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WheelchairProfile {
    pub id: ProfileId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub width_cm: f64,
    pub length_cm: f64,
    pub min_door_width_cm: f64,
    pub max_step_height_cm: f64,
    pub max_slope_percent: f64,
    #[serde(default)]
    pub can_handle_gravel: bool,
    #[serde(default)]
    pub can_handle_grass: bool,
    pub wheelchair_type: WheelchairType,
    #[serde(default)]
    pub is_default: bool,
}

/// Body for creating a custom profile. Omitted limits take the server's
/// defaults (2cm step, 8% slope, manual chair).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WheelchairProfileCreate {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub width_cm: f64,
    pub length_cm: f64,
    pub min_door_width_cm: f64,
    #[serde(default = "default_max_step_height_cm")]
    pub max_step_height_cm: f64,
    #[serde(default = "default_max_slope_percent")]
    pub max_slope_percent: f64,
    #[serde(default)]
    pub can_handle_gravel: bool,
    #[serde(default)]
    pub can_handle_grass: bool,
    #[serde(default = "default_wheelchair_type")]
    pub wheelchair_type: WheelchairType,
}

fn default_max_step_height_cm() -> f64 {
    2.0
}

fn default_max_slope_percent() -> f64 {
    8.0
}

fn default_wheelchair_type() -> WheelchairType {
    WheelchairType::Manual
}

impl WheelchairProfileCreate {
    pub fn new(
        name: impl Into<String>,
        width_cm: f64,
        length_cm: f64,
        min_door_width_cm: f64,
    ) -> Self {
        Self {
            name: name.into(),
            description: None,
            width_cm,
            length_cm,
            min_door_width_cm,
            max_step_height_cm: default_max_step_height_cm(),
            max_slope_percent: default_max_slope_percent(),
            can_handle_gravel: false,
            can_handle_grass: false,
            wheelchair_type: default_wheelchair_type(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeFeatures {
    #[serde(default)]
    pub has_ramp: bool,
    #[serde(default)]
    pub has_handrails: bool,
    #[serde(default)]
    pub has_elevator: bool,
    #[serde(default = "default_lighting")]
    pub lighting: String,
    #[serde(default = "default_floor_type")]
    pub floor_type: String,
}

fn default_lighting() -> String {
    "adequate".to_string()
}

fn default_floor_type() -> String {
    "unknown".to_string()
}

impl Default for NodeFeatures {
    fn default() -> Self {
        Self {
            has_ramp: false,
            has_handrails: false,
            has_elevator: false,
            lighting: default_lighting(),
            floor_type: default_floor_type(),
        }
    }
}

/// One photographed space. `id` is the graph key used by edges and by
/// `WorldModel::recommended_path`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorldModelNode {
    pub id: String,
    pub image_id: ImageId,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub label: String,
    pub space_type: SpaceType,
    #[serde(default)]
    pub barriers: Vec<BarrierSummary>,
    pub accessibility_score: f64,
    #[serde(default)]
    pub features: NodeFeatures,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorldModelEdge {
    pub source: String,
    pub target: String,
    pub traversable: bool,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub barriers_in_path: Vec<BarrierId>,
    pub distance_estimate: DistanceEstimate,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Spatial graph the analysis builds over a scan's images.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorldModel {
    pub scan_id: ScanId,
    #[serde(default)]
    pub nodes: Vec<WorldModelNode>,
    #[serde(default)]
    pub edges: Vec<WorldModelEdge>,
    #[serde(default)]
    pub recommended_path: Option<Vec<String>>,
}

impl WorldModel {
    pub fn node(&self, id: &str) -> Option<&WorldModelNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    /// Nodes along the recommended path, skipping ids with no node.
    pub fn recommended_nodes(&self) -> Vec<&WorldModelNode> {
        self.recommended_path
            .iter()
            .flatten()
            .filter_map(|id| self.node(id))
            .collect()
    }

    pub fn blocked_edges(&self) -> impl Iterator<Item = &WorldModelEdge> {
        self.edges
            .iter()
            .filter(|edge| !edge.traversable || edge.difficulty == Difficulty::Impassable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_detail_flattens_summary_fields() {
        let raw = serde_json::json!({
            "id": "6f1c1d2e-8a53-4c1a-9d7a-0c3e5b1a2f10",
            "name": "Town hall",
            "description": null,
            "location": "Main St",
            "status": "ready",
            "image_count": 0,
            "created_at": "2026-01-02T03:04:05Z",
            "updated_at": "2026-01-02T03:04:05Z",
            "images": [],
            "analysis_result": null,
            "has_guide": false
        });
        let detail: ScanDetail = serde_json::from_value(raw).expect("parse detail");
        assert_eq!(detail.scan.name, "Town hall");
        assert_eq!(detail.scan.status, ScanStatus::Ready);
        assert!(detail.images.is_empty());
    }

    #[test]
    fn barrier_groups_flat_geometry_columns() {
        let raw = serde_json::json!({
            "id": "0b6c4f4e-5d0e-4b8a-a3c2-6f8d9e0a1b2c",
            "image_id": "1c7d5a5f-6e1f-4c9b-b4d3-7a9e0f1b2c3d",
            "barrier_type": "narrow_door",
            "severity": "high",
            "description": "Door narrower than 80cm",
            "bbox_x": 0.1, "bbox_y": 0.2, "bbox_width": 0.3, "bbox_height": 0.4,
            "estimated_width_cm": 70.0,
            "confidence": 0.9
        });
        let barrier: Barrier = serde_json::from_value(raw).expect("parse barrier");
        let bbox = barrier.bounding_box().expect("bbox");
        assert_eq!(bbox.width, 0.3);
        let dims = barrier.dimensions().expect("dims");
        assert_eq!(dims.width_cm, Some(70.0));
        assert_eq!(dims.height_cm, None);
    }

    #[test]
    fn partial_geometry_is_not_a_bounding_box() {
        let raw = serde_json::json!({
            "id": "0b6c4f4e-5d0e-4b8a-a3c2-6f8d9e0a1b2c",
            "image_id": "1c7d5a5f-6e1f-4c9b-b4d3-7a9e0f1b2c3d",
            "barrier_type": "step",
            "severity": "low",
            "description": "Small lip",
            "bbox_x": 0.1,
            "confidence": 0.5
        });
        let barrier: Barrier = serde_json::from_value(raw).expect("parse barrier");
        assert!(barrier.bounding_box().is_none());
        assert!(barrier.dimensions().is_none());
    }

    #[test]
    fn profile_create_fills_server_defaults() {
        let raw = serde_json::json!({
            "name": "Travel chair",
            "width_cm": 60.0,
            "length_cm": 100.0,
            "min_door_width_cm": 75.0
        });
        let parsed: WheelchairProfileCreate = serde_json::from_value(raw).expect("parse");
        assert_eq!(parsed, WheelchairProfileCreate::new("Travel chair", 60.0, 100.0, 75.0));

        let body = serde_json::to_value(&parsed).expect("encode");
        assert!(body.get("description").is_none());
        assert_eq!(body["wheelchair_type"], "manual");
    }

    #[test]
    fn world_model_resolves_the_recommended_path() {
        let raw = serde_json::json!({
            "scan_id": "6f1c1d2e-8a53-4c1a-9d7a-0c3e5b1a2f10",
            "nodes": [
                {
                    "id": "node_0",
                    "image_id": "1c7d5a5f-6e1f-4c9b-b4d3-7a9e0f1b2c3d",
                    "label": "Entrance",
                    "space_type": "entrance",
                    "accessibility_score": 90.0
                },
                {
                    "id": "node_1",
                    "image_id": "0b6c4f4e-5d0e-4b8a-a3c2-6f8d9e0a1b2c",
                    "label": "Stairs up",
                    "space_type": "stairway",
                    "accessibility_score": 20.0,
                    "features": { "has_handrails": true }
                }
            ],
            "edges": [{
                "source": "node_0",
                "target": "node_1",
                "traversable": false,
                "difficulty": "impassable",
                "distance_estimate": "short"
            }],
            "recommended_path": ["node_1", "missing", "node_0"]
        });
        let model: WorldModel = serde_json::from_value(raw).expect("parse world model");

        let path: Vec<&str> = model
            .recommended_nodes()
            .iter()
            .map(|node| node.label.as_str())
            .collect();
        assert_eq!(path, vec!["Stairs up", "Entrance"]);
        assert_eq!(model.nodes[0].features, NodeFeatures::default());
        assert!(model.nodes[1].features.has_handrails);
        assert_eq!(model.nodes[1].features.lighting, "adequate");
        assert_eq!(model.blocked_edges().count(), 1);
    }

    #[test]
    fn start_request_omits_defaults() {
        let body = serde_json::to_value(StartAnalysisRequest::default()).expect("encode");
        assert_eq!(body, serde_json::json!({}));

        let body = serde_json::to_value(StartAnalysisRequest {
            wheelchair_profile_id: None,
            force: true,
        })
        .expect("encode");
        assert_eq!(body, serde_json::json!({ "force": true }));
    }
}
