use uuid::Uuid;

/// Source of fresh record identifiers.
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> Uuid;
}

/// Random v4 identifiers.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn generate(&self) -> Uuid {
        Uuid::new_v4()
    }
}
