use rigging_common::field::{FieldKind, FieldSpec, SelectOption};
use rigging_common::value::ConfigValue;

/// Closed interface over every concrete input widget. Dispatch is a
/// virtual call; the engine never inspects a widget's concrete type.
pub trait FieldWidget: Send {
    /// Current display value. Meaningful only while the owning field is
    /// enabled.
    fn value(&self) -> ConfigValue;

    /// Applies a value. Returns false when the widget cannot represent
    /// it (wrong shape, or no matching option yet).
    fn set_value(&mut self, value: &ConfigValue) -> bool;

    fn set_interactive(&mut self, interactive: bool);

    /// Clears visible content without touching any saved state.
    fn clear_display(&mut self);

    /// Present only for widgets whose option list can be replaced at
    /// runtime.
    fn options_updater(&mut self) -> Option<&mut dyn OptionsUpdater> {
        None
    }
}

pub trait OptionsUpdater {
    /// Swaps the option list, keeping the current selection when it
    /// survives the swap. Returns false when the replacement leaves an
    /// option-required widget with nothing to offer.
    fn replace_options(&mut self, options: Vec<SelectOption>) -> bool;
}

/// Builds the widget matching a field declaration's kind.
pub fn widget_for(spec: &FieldSpec) -> Box<dyn FieldWidget> {
    match spec.kind {
        FieldKind::Text | FieldKind::Directory | FieldKind::Ip | FieldKind::Password => {
            Box::new(TextWidget::new(spec.default.as_ref()))
        }
        FieldKind::Checkbox => Box::new(CheckboxWidget::new(spec.default.as_ref())),
        FieldKind::Select => Box::new(SelectWidget::new(
            spec.options.clone().unwrap_or_default(),
            spec.default.as_ref(),
        )),
        FieldKind::CheckboxGroup => Box::new(CheckboxGroupWidget::new(
            spec.options.clone().unwrap_or_default(),
            spec.default.as_ref(),
        )),
    }
}

/// Free-text input. Also backs the directory, IP and password kinds;
/// their differences are validation and rendering concerns outside this
/// engine.
#[derive(Debug, Default)]
pub struct TextWidget {
    content: String,
    interactive: bool,
}

impl TextWidget {
    pub fn new(default: Option<&ConfigValue>) -> Self {
        TextWidget {
            content: default.and_then(ConfigValue::scalar_string).unwrap_or_default(),
            interactive: true,
        }
    }
}

impl FieldWidget for TextWidget {
    fn value(&self) -> ConfigValue {
        ConfigValue::String(self.content.clone())
    }

    fn set_value(&mut self, value: &ConfigValue) -> bool {
        match value {
            ConfigValue::Null => {
                self.content.clear();
                true
            }
            other => match other.scalar_string() {
                Some(s) => {
                    self.content = s;
                    true
                }
                None => false,
            },
        }
    }

    fn set_interactive(&mut self, interactive: bool) {
        self.interactive = interactive;
    }

    fn clear_display(&mut self) {
        self.content.clear();
    }
}

#[derive(Debug, Default)]
pub struct CheckboxWidget {
    checked: bool,
    interactive: bool,
}

impl CheckboxWidget {
    pub fn new(default: Option<&ConfigValue>) -> Self {
        CheckboxWidget {
            checked: default.and_then(ConfigValue::as_bool_lenient).unwrap_or(false),
            interactive: true,
        }
    }
}

impl FieldWidget for CheckboxWidget {
    fn value(&self) -> ConfigValue {
        ConfigValue::Bool(self.checked)
    }

    fn set_value(&mut self, value: &ConfigValue) -> bool {
        match value.as_bool_lenient() {
            Some(checked) => {
                self.checked = checked;
                true
            }
            None => false,
        }
    }

    fn set_interactive(&mut self, interactive: bool) {
        self.interactive = interactive;
    }

    fn clear_display(&mut self) {
        self.checked = false;
    }
}

/// Single-choice selection. With no explicit default the first option
/// is selected.
#[derive(Debug)]
pub struct SelectWidget {
    options: Vec<SelectOption>,
    selected: Option<usize>,
    interactive: bool,
}

impl SelectWidget {
    pub fn new(options: Vec<SelectOption>, default: Option<&ConfigValue>) -> Self {
        let selected = default
            .and_then(|d| options.iter().position(|o| o.value.loose_eq(d)))
            .or(if options.is_empty() { None } else { Some(0) });
        SelectWidget {
            options,
            selected,
            interactive: true,
        }
    }
}

impl FieldWidget for SelectWidget {
    fn value(&self) -> ConfigValue {
        self.selected
            .and_then(|i| self.options.get(i))
            .map(|o| o.value.clone())
            .unwrap_or(ConfigValue::Null)
    }

    fn set_value(&mut self, value: &ConfigValue) -> bool {
        match self.options.iter().position(|o| o.value.loose_eq(value)) {
            Some(i) => {
                self.selected = Some(i);
                true
            }
            None => false,
        }
    }

    fn set_interactive(&mut self, interactive: bool) {
        self.interactive = interactive;
    }

    fn clear_display(&mut self) {
        self.selected = None;
    }

    fn options_updater(&mut self) -> Option<&mut dyn OptionsUpdater> {
        Some(self)
    }
}

impl OptionsUpdater for SelectWidget {
    fn replace_options(&mut self, options: Vec<SelectOption>) -> bool {
        let current = self.value();
        self.options = options;
        self.selected = self
            .options
            .iter()
            .position(|o| o.value.loose_eq(&current))
            .or(if self.options.is_empty() { None } else { Some(0) });
        true
    }
}

/// Multi-choice selection. Its value is the list of selected option
/// values.
#[derive(Debug, Default)]
pub struct CheckboxGroupWidget {
    options: Vec<SelectOption>,
    selected: Vec<ConfigValue>,
    interactive: bool,
}

impl CheckboxGroupWidget {
    pub fn new(options: Vec<SelectOption>, default: Option<&ConfigValue>) -> Self {
        let mut widget = CheckboxGroupWidget {
            options,
            selected: Vec::new(),
            interactive: true,
        };
        if let Some(default) = default {
            widget.set_value(default);
        }
        widget
    }

    fn has_option(&self, value: &ConfigValue) -> bool {
        self.options.iter().any(|o| o.value.loose_eq(value))
    }
}

impl FieldWidget for CheckboxGroupWidget {
    fn value(&self) -> ConfigValue {
        ConfigValue::List(self.selected.clone())
    }

    fn set_value(&mut self, value: &ConfigValue) -> bool {
        let Some(requested) = value.as_list() else {
            return false;
        };
        let (found, missing): (Vec<_>, Vec<_>) =
            requested.iter().cloned().partition(|v| self.has_option(v));
        self.selected = found;
        missing.is_empty()
    }

    fn set_interactive(&mut self, interactive: bool) {
        self.interactive = interactive;
    }

    fn clear_display(&mut self) {
        self.selected.clear();
    }

    fn options_updater(&mut self) -> Option<&mut dyn OptionsUpdater> {
        Some(self)
    }
}

impl OptionsUpdater for CheckboxGroupWidget {
    fn replace_options(&mut self, options: Vec<SelectOption>) -> bool {
        self.options = options;
        self.selected.retain(|v| {
            self.options.iter().any(|o| o.value.loose_eq(v))
        });
        !self.options.is_empty()
    }
}
