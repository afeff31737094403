// Domain layer - data model and pure chart algorithms
pub mod annotation;
pub mod guide;
pub mod layers;
pub mod merge;
pub mod options;
pub mod payload;
pub mod placement;
pub mod scale;
pub mod source;
