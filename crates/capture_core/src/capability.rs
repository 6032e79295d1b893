//! Static vision capability table for local models

/// Known vision-capable local model families
pub const VISION_MODEL_FAMILIES: &[&str] = &[
    "llava",
    "bakllava",
    "moondream",
    "llava-llama3",
    "llava-phi3",
    "llava-v1.6-34b",
    "cogvlm",
    "llava-stable",
    "vision",
];

/// Whether a named local model accepts image input
///
/// Matches case-insensitively on an exact family name or on the family name
/// appearing anywhere in the model name (`llava:13b`, `llama3.2-vision`).
pub fn is_image_capable(model_name: &str) -> bool {
    let name = model_name.trim().to_lowercase();
    if name.is_empty() {
        return false;
    }
    VISION_MODEL_FAMILIES
        .iter()
        .any(|family| name == *family || name.contains(family))
}
