//! What a panel hosts.
//!
//! A [`ContentDescriptor`] is a tagged union with one factory per tag; the
//! [`ContentHost`] dispatches on the tag and hands every factory the same
//! [`PanelContext`].

mod context;
pub mod html;

pub use context::PanelContext;
pub use html::HtmlContent;

use std::fmt;
use std::sync::{Arc, Mutex};

use crossterm::event::KeyEvent;
use serde_json::Value;

use crate::error::{PanelError, PanelResult};

/// Anything a panel can render in its body.
pub trait PanelContent: Send {
    /// Title suggested by the content; used when the caller supplied none.
    fn title(&self) -> Option<String> {
        None
    }

    /// Body lines laid out for `width` cells.
    fn body(&self, width: u16) -> Vec<String>;

    fn handle_key(&mut self, _key: &KeyEvent) -> bool {
        false
    }

    /// Called exactly once during teardown, before the content is dropped.
    fn destroy(&mut self) {}
}

/// Content types that can be instantiated from a [`ComponentRef`].
pub trait PanelComponent: PanelContent + Sized + 'static {
    fn create(ctx: &PanelContext) -> PanelResult<Self>;
}

pub type SharedContent = Arc<Mutex<Box<dyn PanelContent>>>;

type ComponentFactory = dyn Fn(&PanelContext) -> PanelResult<Box<dyn PanelContent>> + Send + Sync;

/// Reference to a component type plus the factory that builds it.
#[derive(Clone)]
pub struct ComponentRef {
    type_name: String,
    factory: Arc<ComponentFactory>,
}

impl ComponentRef {
    pub fn of<C: PanelComponent>() -> Self {
        Self {
            type_name: std::any::type_name::<C>().to_string(),
            factory: Arc::new(|ctx: &PanelContext| {
                Ok(Box::new(C::create(ctx)?) as Box<dyn PanelContent>)
            }),
        }
    }

    pub fn from_fn<F>(type_name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&PanelContext) -> PanelResult<Box<dyn PanelContent>> + Send + Sync + 'static,
    {
        Self {
            type_name: type_name.into(),
            factory: Arc::new(factory),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }
}

impl fmt::Debug for ComponentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ComponentRef").field(&self.type_name).finish()
    }
}

type TemplateRenderer = dyn Fn(&Value, u16) -> Vec<String> + Send + Sync;

/// Named template rendered against a JSON context.
#[derive(Clone)]
pub struct TemplateRef {
    name: String,
    render: Arc<TemplateRenderer>,
}

impl TemplateRef {
    pub fn new<F>(name: impl Into<String>, render: F) -> Self
    where
        F: Fn(&Value, u16) -> Vec<String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            render: Arc::new(render),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for TemplateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TemplateRef").field(&self.name).finish()
    }
}

type ViewRenderer = dyn Fn(u16) -> Vec<String> + Send + Sync;

/// A small renderable used for header and footer customisation.
#[derive(Clone)]
pub struct PanelView {
    name: String,
    render: Arc<ViewRenderer>,
}

impl PanelView {
    pub fn from_fn<F>(name: impl Into<String>, render: F) -> Self
    where
        F: Fn(u16) -> Vec<String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            render: Arc::new(render),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self::from_fn("text", move |width| html::wrap(&text, width))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn lines(&self, width: u16) -> Vec<String> {
        (self.render)(width)
    }
}

impl fmt::Debug for PanelView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PanelView").field(&self.name).finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    Component,
    Html,
    Template,
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ContentKind::Component => "component",
            ContentKind::Html => "html",
            ContentKind::Template => "template",
        };
        write!(f, "{}", s)
    }
}

/// Logical identity of hosted content, used to find a minimized panel
/// showing the same thing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentKey {
    pub kind: ContentKind,
    pub name: String,
}

#[derive(Debug, Clone)]
pub enum ContentDescriptor {
    Component(ComponentRef),
    Html(String),
    Template { template: TemplateRef, context: Value },
}

impl ContentDescriptor {
    pub fn component<C: PanelComponent>() -> Self {
        ContentDescriptor::Component(ComponentRef::of::<C>())
    }

    pub fn html(html: impl Into<String>) -> Self {
        ContentDescriptor::Html(html.into())
    }

    pub fn template(template: TemplateRef, context: Value) -> Self {
        ContentDescriptor::Template { template, context }
    }

    pub fn kind(&self) -> ContentKind {
        match self {
            ContentDescriptor::Component(_) => ContentKind::Component,
            ContentDescriptor::Html(_) => ContentKind::Html,
            ContentDescriptor::Template { .. } => ContentKind::Template,
        }
    }

    /// A descriptor with nothing to render counts as absent content.
    pub fn is_empty(&self) -> bool {
        match self {
            ContentDescriptor::Component(component) => component.type_name.trim().is_empty(),
            ContentDescriptor::Html(html) => html.trim().is_empty(),
            ContentDescriptor::Template { template, .. } => template.name.trim().is_empty(),
        }
    }

    /// Identity for de-duplication. HTML strings have none.
    pub fn key(&self) -> Option<ContentKey> {
        match self {
            ContentDescriptor::Component(component) => Some(ContentKey {
                kind: ContentKind::Component,
                name: component.type_name.clone(),
            }),
            ContentDescriptor::Html(_) => None,
            ContentDescriptor::Template { template, .. } => Some(ContentKey {
                kind: ContentKind::Template,
                name: template.name.clone(),
            }),
        }
    }
}

/// Renders template content against its context on every frame.
struct TemplateContent {
    template: TemplateRef,
    context: Value,
}

impl PanelContent for TemplateContent {
    fn title(&self) -> Option<String> {
        self.context
            .get("title")
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    fn body(&self, width: u16) -> Vec<String> {
        (self.template.render)(&self.context, width)
    }
}

/// Instantiates content for each descriptor tag.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentHost;

impl ContentHost {
    pub fn new() -> Self {
        Self
    }

    pub fn create(
        &self,
        descriptor: &ContentDescriptor,
        ctx: &PanelContext,
    ) -> PanelResult<Box<dyn PanelContent>> {
        if descriptor.is_empty() {
            return Err(PanelError::MissingContent);
        }
        match descriptor {
            ContentDescriptor::Component(component) => (component.factory)(ctx),
            ContentDescriptor::Html(html) => Ok(Box::new(HtmlContent::parse(html))),
            ContentDescriptor::Template { template, context } => Ok(Box::new(TemplateContent {
                template: template.clone(),
                context: context.clone(),
            })),
        }
    }
}
