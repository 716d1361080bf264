//! Host events and event types as seen from Lua.

use std::sync::Arc;

use mlua::{
    AnyUserData, Lua, LuaSerdeExt, MetaMethod, SerializeOptions, UserData, UserDataFields,
    UserDataMethods, Value,
};
use serde::Serialize;

use super::taxonomy::{simple_name, EventCategory, EventTaxonomy};
use crate::host::model::{HostEvent, Location};

/// Handle returned by `getEventType`, used for comparisons and reflection.
#[derive(Debug, Clone, PartialEq)]
pub struct EventType {
    name: String,
    category: Option<EventCategory>,
}

impl EventType {
    /// Qualify `name` and attach its category if it names one.
    pub fn resolve(name: &str, taxonomy: &EventTaxonomy) -> Self {
        let name = taxonomy.qualify(name);
        let category = taxonomy.resolve(&name);
        Self { name, category }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> Option<EventCategory> {
        self.category
    }

    /// True if the event is of this exact type or belongs to this category.
    pub fn matches(&self, event: &ScriptEvent) -> bool {
        event.type_name() == self.name
            || self.category.is_some_and(|c| c.applies_to(&event.event))
    }

    /// Interpret a script argument as an event type: either a name or a handle.
    pub fn from_lua_arg(value: &Value, taxonomy: &EventTaxonomy) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self::resolve(&s.to_string_lossy(), taxonomy)),
            Value::UserData(ud) => ud.borrow::<EventType>().ok().map(|t| (*t).clone()),
            _ => None,
        }
    }
}

impl UserData for EventType {
    fn add_fields<F: UserDataFields<Self>>(fields: &mut F) {
        fields.add_field_method_get("name", |_, this| Ok(this.name.clone()));
        fields.add_field_method_get("simple_name", |_, this| {
            Ok(simple_name(&this.name).to_string())
        });
    }

    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("matches", |_, this, event: AnyUserData| {
            Ok(event
                .borrow::<ScriptEvent>()
                .map(|e| this.matches(&e))
                .unwrap_or(false))
        });
        methods.add_meta_method(MetaMethod::Eq, |_, this, other: AnyUserData| {
            Ok(other
                .borrow::<EventType>()
                .map(|o| o.name == this.name)
                .unwrap_or(false))
        });
        methods.add_meta_method(MetaMethod::ToString, |_, this, ()| Ok(this.name.clone()));
    }
}

/// One host occurrence, optionally narrowed to a single category.
#[derive(Debug, Clone)]
pub struct ScriptEvent {
    event: Arc<HostEvent>,
    type_name: String,
    shape: Option<EventCategory>,
}

impl ScriptEvent {
    pub fn new(event: Arc<HostEvent>, taxonomy: &EventTaxonomy) -> Self {
        let type_name = taxonomy.qualify(&event.name);
        Self {
            event,
            type_name,
            shape: None,
        }
    }

    pub fn event(&self) -> &HostEvent {
        &self.event
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn shape(&self) -> Option<EventCategory> {
        self.shape
    }

    /// View the same occurrence as `category`. Returns `None` when the event
    /// does not belong to that category.
    pub fn narrowed(&self, category: EventCategory) -> Option<Self> {
        category.applies_to(&self.event).then(|| Self {
            shape: Some(category),
            ..self.clone()
        })
    }

    /// The shaped category, or the first category the event belongs to.
    fn effective_category(&self) -> Option<EventCategory> {
        self.shape.or_else(|| EventCategory::of(&self.event).next())
    }

    pub fn location(&self) -> Option<Location> {
        self.effective_category().and_then(|c| c.extract(&self.event))
    }

    fn target(&self, lua: &Lua) -> mlua::Result<Value> {
        let event = &self.event;
        match self.effective_category() {
            Some(EventCategory::TargetEntity) => to_lua(lua, event.target_entity.as_ref()),
            Some(EventCategory::TargetBlock) => to_lua(lua, event.target_block.as_ref()),
            Some(EventCategory::TargetTileEntity) => to_lua(lua, event.target_tile.as_ref()),
            Some(EventCategory::TargetUser) => to_lua(lua, event.target_user.as_ref()),
            None => Ok(Value::Nil),
        }
    }
}

impl UserData for ScriptEvent {
    fn add_fields<F: UserDataFields<Self>>(fields: &mut F) {
        fields.add_field_method_get("name", |_, this| Ok(this.type_name.clone()));
        fields.add_field_method_get("fired_at", |_, this| {
            Ok(this.event.fired_at.to_rfc3339())
        });
        fields.add_field_method_get("entity", |lua, this| {
            to_lua(lua, this.event.target_entity.as_ref())
        });
        fields.add_field_method_get("block", |lua, this| {
            to_lua(lua, this.event.target_block.as_ref())
        });
        fields.add_field_method_get("tile", |lua, this| {
            to_lua(lua, this.event.target_tile.as_ref())
        });
        fields.add_field_method_get("user", |lua, this| {
            to_lua(lua, this.event.target_user.as_ref())
        });
        fields.add_field_method_get("location", |lua, this| {
            to_lua(lua, this.location().as_ref())
        });
        fields.add_field_method_get("shape", |_, this| Ok(this.shape.map(|c| c.name())));
    }

    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("target", |lua, this, ()| this.target(lua));
        methods.add_method("is", |lua, this, ty: Value| {
            let taxonomy = lua
                .app_data_ref::<Arc<EventTaxonomy>>()
                .map(|t| Arc::clone(&t))
                .unwrap_or_default();
            Ok(EventType::from_lua_arg(&ty, &taxonomy).is_some_and(|t| t.matches(this)))
        });
        methods.add_meta_method(MetaMethod::ToString, |_, this, ()| {
            Ok(match this.shape {
                Some(shape) => format!("{} as {}", this.type_name, shape.name()),
                None => this.type_name.clone(),
            })
        });
    }
}

/// Serialize an optional host value into a Lua table, `nil` when absent.
fn to_lua<T: Serialize>(lua: &Lua, value: Option<&T>) -> mlua::Result<Value> {
    match value {
        Some(value) => lua.to_value_with(
            value,
            SerializeOptions::new().serialize_none_to_null(false),
        ),
        None => Ok(Value::Nil),
    }
}
