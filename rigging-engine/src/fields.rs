use std::collections::BTreeMap;

use tokio::sync::mpsc;
use tracing::debug;

use rigging_common::field::FieldSpec;
use rigging_common::value::ConfigValue;

use crate::widget::{FieldWidget, widget_for};

/// Notification delivered to the widget layer when the engine changes a
/// field.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldEvent {
    ValueChanged {
        field_id: String,
        value: ConfigValue,
    },
    EnabledChanged {
        field_id: String,
        enabled: bool,
    },
}

/// One live field: its declaration, its widget and its enablement
/// state machine.
pub struct FieldHandle {
    pub spec: FieldSpec,
    widget: Box<dyn FieldWidget>,
    enabled: bool,
    saved_value: Option<ConfigValue>,
}

impl FieldHandle {
    pub fn new(spec: FieldSpec) -> Self {
        let widget = widget_for(&spec);
        FieldHandle {
            spec,
            widget,
            enabled: true,
            saved_value: None,
        }
    }

    pub fn with_widget(spec: FieldSpec, widget: Box<dyn FieldWidget>) -> Self {
        FieldHandle {
            spec,
            widget,
            enabled: true,
            saved_value: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.spec.id
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Current value; a disabled field has none.
    pub fn value(&self) -> Option<ConfigValue> {
        self.enabled.then(|| self.widget.value())
    }

    /// Applies a value through the widget. Disabled fields reject
    /// writes; the caller retries or drops as appropriate.
    pub fn set_value(&mut self, value: &ConfigValue) -> bool {
        self.enabled && self.widget.set_value(value)
    }

    pub fn widget_mut(&mut self) -> &mut dyn FieldWidget {
        self.widget.as_mut()
    }

    /// Disabling snapshots the current value and clears the display.
    /// Idempotent: disabling an already-disabled field changes nothing.
    fn disable(&mut self) {
        if !self.enabled {
            return;
        }
        self.saved_value = Some(self.widget.value());
        self.widget.clear_display();
        self.widget.set_interactive(false);
        self.enabled = false;
    }

    /// Enabling restores the snapshot taken at disable time.
    /// Idempotent: enabling an already-enabled field changes nothing.
    fn enable(&mut self) {
        if self.enabled {
            return;
        }
        if let Some(saved) = self.saved_value.take() {
            if !self.widget.set_value(&saved) {
                debug!(
                    field_id = %self.spec.id,
                    "Widget no longer accepts the snapshotted value, restore skipped"
                );
            }
        }
        self.widget.set_interactive(true);
        self.enabled = true;
    }
}

/// Single owner of a configuration group's live fields. Other engine
/// components borrow it; nothing else holds field state.
#[derive(Default)]
pub struct FieldRegistry {
    fields: BTreeMap<String, FieldHandle>,
    events: Option<mpsc::UnboundedSender<FieldEvent>>,
}

impl FieldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(events: mpsc::UnboundedSender<FieldEvent>) -> Self {
        FieldRegistry {
            fields: BTreeMap::new(),
            events: Some(events),
        }
    }

    pub fn register(&mut self, handle: FieldHandle) {
        self.fields.insert(handle.id().to_string(), handle);
    }

    pub fn remove(&mut self, field_id: &str) -> Option<FieldHandle> {
        self.fields.remove(field_id)
    }

    pub fn contains(&self, field_id: &str) -> bool {
        self.fields.contains_key(field_id)
    }

    pub fn lookup(&self, field_id: &str) -> Option<&FieldHandle> {
        self.fields.get(field_id)
    }

    pub fn lookup_mut(&mut self, field_id: &str) -> Option<&mut FieldHandle> {
        self.fields.get_mut(field_id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn handles(&self) -> impl Iterator<Item = &FieldHandle> {
        self.fields.values()
    }

    /// Convenience read: `None` for unknown or disabled fields.
    pub fn value_of(&self, field_id: &str) -> Option<ConfigValue> {
        self.fields.get(field_id).and_then(FieldHandle::value)
    }

    /// Applies a value to a field, emitting a change event on success.
    pub fn set_value(&mut self, field_id: &str, value: &ConfigValue) -> bool {
        let Some(handle) = self.fields.get_mut(field_id) else {
            debug!(field_id, "Value write to unknown field");
            return false;
        };
        if !handle.set_value(value) {
            return false;
        }
        let applied = handle.widget.value();
        self.emit(FieldEvent::ValueChanged {
            field_id: field_id.to_string(),
            value: applied,
        });
        true
    }

    /// Transitions a field's enabled state, emitting an event only on an
    /// actual transition.
    pub fn set_enabled(&mut self, field_id: &str, enabled: bool) {
        let Some(handle) = self.fields.get_mut(field_id) else {
            debug!(field_id, "Enable toggle on unknown field");
            return;
        };
        if handle.enabled == enabled {
            return;
        }
        if enabled {
            handle.enable();
        } else {
            handle.disable();
        }
        self.emit(FieldEvent::EnabledChanged {
            field_id: field_id.to_string(),
            enabled,
        });
    }

    fn emit(&self, event: FieldEvent) {
        if let Some(sender) = &self.events {
            // Receiver dropping just means nobody is listening anymore.
            let _ = sender.send(event);
        }
    }
}
