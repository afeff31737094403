// The render payload handed from the fetch worker to the renderer
use super::annotation::Annotation;
use super::layers::Layer;
use super::options::GraphOptions;
use serde::Serialize;

/// Everything needed to draw one refresh of a chart. Produced once per fetch cycle and
/// never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderPayload {
    pub options: GraphOptions,
    /// Epoch seconds.
    pub start: i64,
    pub end: i64,
    /// Overlay distance in seconds, 0 without overlay.
    pub offset: i64,
    pub max: f64,
    pub min: f64,
    pub layer_count: usize,
    pub current_layers: Vec<Layer>,
    pub previous_layers: Vec<Layer>,
    pub annotations: Vec<Annotation>,
}

impl RenderPayload {
    pub fn has_data(&self) -> bool {
        self.current_layers
            .iter()
            .chain(self.previous_layers.iter())
            .any(|layer| !layer.is_empty())
    }

    /// Layers drawn on screen: the current period, plus the previous one when overlaid.
    pub fn visible_layers(&self) -> Vec<&Layer> {
        let mut layers: Vec<&Layer> = self.current_layers.iter().collect();
        if self.options.overlay_enabled() {
            layers.extend(self.previous_layers.iter());
        }
        layers
    }
}
