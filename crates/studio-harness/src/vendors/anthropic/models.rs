use tracing::warn;

/// Rough price band shown next to a model.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CostTier {
    Cheap,
    Balanced,
    Expensive,
}

impl CostTier {
    /// Lowercase name shown in model listings.
    pub fn label(self) -> &'static str {
        match self {
            Self::Cheap => "cheap",
            Self::Balanced => "balanced",
            Self::Expensive => "expensive",
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ModelInfo {
    pub id: &'static str,
    pub label: &'static str,
    pub description: &'static str,
    pub cost_tier: CostTier,
}

pub const DEFAULT_MODEL: &str = "claude-3-5-haiku-20241022";

/// Models the studio accepts. Anything else falls back to [`DEFAULT_MODEL`].
pub const AVAILABLE_MODELS: &[ModelInfo] = &[
    ModelInfo {
        id: "claude-3-5-haiku-20241022",
        label: "Haiku (Fast & Cheap)",
        description: "Fast, low-cost model for simple tasks",
        cost_tier: CostTier::Cheap,
    },
    ModelInfo {
        id: "claude-3-5-sonnet-20241022",
        label: "Sonnet (Balanced)",
        description: "Well-rounded model for most tasks",
        cost_tier: CostTier::Balanced,
    },
    ModelInfo {
        id: "claude-3-opus-20250219",
        label: "Opus (Highest Quality)",
        description: "Most powerful model, best for complex tasks",
        cost_tier: CostTier::Expensive,
    },
];

pub fn model_info(id: &str) -> Option<&'static ModelInfo> {
    AVAILABLE_MODELS.iter().find(|m| m.id == id)
}

/// Returns `requested` if it is allowed, otherwise the default model.
pub fn resolve_model(requested: Option<&str>) -> &'static str {
    let Some(requested) = requested.map(str::trim).filter(|r| !r.is_empty()) else {
        return DEFAULT_MODEL;
    };
    match model_info(requested) {
        Some(info) => info.id,
        None => {
            warn!(requested, fallback = DEFAULT_MODEL, "unknown model requested");
            DEFAULT_MODEL
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowed_models_pass_through() {
        assert_eq!(
            resolve_model(Some("claude-3-5-sonnet-20241022")),
            "claude-3-5-sonnet-20241022"
        );
    }

    #[test]
    fn unknown_or_missing_model_falls_back() {
        assert_eq!(resolve_model(Some("gpt-5-nano")), DEFAULT_MODEL);
        assert_eq!(resolve_model(Some("  ")), DEFAULT_MODEL);
        assert_eq!(resolve_model(None), DEFAULT_MODEL);
    }

    #[test]
    fn default_model_is_in_the_catalog() {
        assert_eq!(model_info(DEFAULT_MODEL).map(|m| m.cost_tier), Some(CostTier::Cheap));
    }

    #[test]
    fn cost_tiers_rise_with_model_size() {
        let tiers: Vec<_> = AVAILABLE_MODELS.iter().map(|m| m.cost_tier.label()).collect();
        assert_eq!(tiers, ["cheap", "balanced", "expensive"]);
    }
}
