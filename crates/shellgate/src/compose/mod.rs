//! Page body composition: content fetch, component rendering and the
//! active navigation highlight.

pub mod composer;
pub mod nav;
pub mod registry;

pub use composer::{ContentComposer, Navigation, NotFoundReason, PageState, RenderedPage};
pub use nav::{CompositeNavSink, FnNavSink, NavEvent, NavHighlight, NavSink, NoopNavSink};
pub use registry::{
    BUILTIN_COMPONENTS, ComponentRegistry, RenderedComponent, RenderedComponents,
    SkippedComponent,
};
