use async_trait::async_trait;

/// Identifies an ingredient from an uploaded image.
#[async_trait]
pub trait IngredientRecognizer: Send + Sync {
    /// Returns the ingredient name shown in `image_ref`, if any
    async fn recognize(&self, image_ref: &str) -> Option<String>;
}

/// Recognizer used when no classifier is configured. Never matches.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRecognizer;

#[async_trait]
impl IngredientRecognizer for NoopRecognizer {
    async fn recognize(&self, _image_ref: &str) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_never_matches() {
        assert_eq!(NoopRecognizer.recognize("uploads/abc-flour.jpg").await, None);
    }
}
