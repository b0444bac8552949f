//! The resolved chain of layers and its merged views.

use crate::availability::{Availability, child_mask};
use crate::layer::LayerMetadata;

/// Attribution strings of a layer stack, child first, without duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credits(Vec<String>);

impl Credits {
    /// Collect attributions from `layers` in order, keeping the first
    /// occurrence of each.
    #[must_use]
    pub fn from_layers(layers: &[LayerMetadata]) -> Self {
        let mut credits: Vec<String> = Vec::new();
        for attribution in layers.iter().filter_map(|l| l.attribution.as_deref()) {
            if !credits.iter().any(|c| c == attribution) {
                credits.push(attribution.to_string());
            }
        }
        Self(credits)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Ordered layers, index 0 the most specific child, last the root ancestor.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerStack {
    layers: Vec<LayerMetadata>,
    credits: Credits,
}

impl LayerStack {
    #[must_use]
    pub fn new(layers: Vec<LayerMetadata>) -> Self {
        let credits = Credits::from_layers(&layers);
        Self { layers, credits }
    }

    #[must_use]
    pub fn layers(&self) -> &[LayerMetadata] {
        &self.layers
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&LayerMetadata> {
        self.layers.get(index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    #[must_use]
    pub fn credits(&self) -> &Credits {
        &self.credits
    }

    /// Merged availability of a tile in TMS rows.
    ///
    /// The first layer reporting the tile available wins. Otherwise the
    /// tile is unknown if any layer could not tell, else unavailable.
    #[must_use]
    pub fn availability(&self, level: u32, x: u32, y: u32) -> Availability {
        self.layers
            .iter()
            .map(|layer| layer.availability(level, x, y))
            .try_fold(Availability::Unavailable, |merged, availability| {
                match availability {
                    Availability::Available => Err(Availability::Available),
                    Availability::Unknown => Ok(Availability::Unknown),
                    Availability::Unavailable => Ok(merged),
                }
            })
            .unwrap_or_else(|available| available)
    }

    /// Child mask of a tile from the merged availability of its children.
    #[must_use]
    pub fn child_mask(&self, level: u32, x: u32, y: u32) -> u8 {
        let Some(child_level) = level.checked_add(1) else {
            return 0;
        };
        child_mask(
            |cx, cy| self.availability(child_level, cx, cy).is_available(),
            x,
            y,
        )
    }

    /// Whether any layer serves oct-encoded vertex normals.
    #[must_use]
    pub fn has_vertex_normals(&self) -> bool {
        self.layers.iter().any(|l| l.has_vertex_normals)
    }

    /// Whether any layer serves water masks.
    #[must_use]
    pub fn has_water_mask(&self) -> bool {
        self.layers.iter().any(|l| l.has_water_mask)
    }

    /// Whether any layer serves the metadata extension.
    #[must_use]
    pub fn has_metadata(&self) -> bool {
        self.layers.iter().any(|l| l.has_metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Url;

    fn layer(name: &str, json: &str) -> LayerMetadata {
        let url = Url::parse(&format!("https://example.com/{name}/layer.json")).unwrap();
        LayerMetadata::parse(&url, json.as_bytes()).unwrap()
    }

    fn child() -> LayerMetadata {
        layer(
            "child",
            r#"{
                "format": "quantized-mesh-1.0",
                "tiles": ["{z}/{x}/{y}.terrain"],
                "attribution": "Child data",
                "extensions": ["watermask"],
                "available": [
                    [{"startX": 0, "startY": 0, "endX": 1, "endY": 0}],
                    [{"startX": 2, "startY": 1, "endX": 2, "endY": 1}]
                ]
            }"#,
        )
    }

    fn parent() -> LayerMetadata {
        layer(
            "parent",
            r#"{
                "format": "quantized-mesh-1.0",
                "tiles": ["{z}/{x}/{y}.terrain"],
                "attribution": "Parent data",
                "available": [
                    [{"startX": 0, "startY": 0, "endX": 1, "endY": 0}],
                    [{"startX": 0, "startY": 0, "endX": 3, "endY": 1}],
                    [{"startX": 4, "startY": 0, "endX": 7, "endY": 3}]
                ]
            }"#,
        )
    }

    #[test]
    fn test_merged_availability() {
        let stack = LayerStack::new(vec![child(), parent()]);

        let child = &stack.layers()[0];
        assert_eq!(child.availability(1, 2, 1), Availability::Available);
        assert_eq!(child.availability(1, 3, 1), Availability::Unavailable);
        assert_eq!(child.availability(2, 0, 0), Availability::Unknown);

        assert_eq!(stack.availability(1, 2, 1), Availability::Available);
        assert_eq!(stack.availability(1, 3, 1), Availability::Available);
        assert_eq!(stack.availability(2, 0, 0), Availability::Unknown);
        assert!(!stack.availability(2, 0, 0).is_available());
        assert_eq!(stack.availability(3, 0, 0), Availability::Unknown);
    }

    #[test]
    fn test_merged_unavailable_when_every_layer_says_so() {
        let stack = LayerStack::new(vec![child(), parent()]);
        // Level 2 is enumerated by the parent; the child defers.
        assert_eq!(stack.availability(2, 4, 0), Availability::Available);

        let stack = LayerStack::new(vec![parent()]);
        assert_eq!(stack.availability(2, 0, 0), Availability::Unavailable);
    }

    #[test]
    fn test_flags_are_or_across_layers() {
        let stack = LayerStack::new(vec![child(), parent()]);
        assert!(stack.has_water_mask());
        assert!(!stack.has_vertex_normals());
        assert!(!stack.has_metadata());
        assert!(stack.layers()[0].has_water_mask);
        assert!(!stack.layers()[1].has_water_mask);
    }

    #[test]
    fn test_credits_child_first_without_duplicates() {
        let stack = LayerStack::new(vec![child(), parent(), child()]);
        assert_eq!(
            stack.credits().iter().collect::<Vec<_>>(),
            vec!["Child data", "Parent data"]
        );
    }

    #[test]
    fn test_child_mask_from_merged_availability() {
        let stack = LayerStack::new(vec![child(), parent()]);
        assert_eq!(stack.child_mask(0, 0, 0), 0b1111);
        // Children of (1, 2, 0) at level 2: (4,0), (5,0), (4,1), (5,1).
        assert_eq!(stack.child_mask(1, 2, 0), 0b1111);
        assert_eq!(stack.child_mask(1, 0, 0), 0);
    }
}
