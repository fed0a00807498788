pub mod invoice;
pub mod organization;
pub mod plan;
pub mod subscription;
