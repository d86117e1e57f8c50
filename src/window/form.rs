//! Room configuration forms.
//!
//! Fields are addressed by short tags (`field1`, `field2`, ...) assigned in
//! document order, so users can edit them with commands such as
//! `/field3 on`.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Boolean,
    TextSingle,
    TextPrivate,
    TextMulti,
    ListSingle,
    ListMulti,
    JidSingle,
    JidMulti,
    Fixed,
    Hidden,
}

impl FieldType {
    pub fn parse(raw: &str) -> Option<Self> {
        Some(match raw {
            "boolean" => FieldType::Boolean,
            "text-single" => FieldType::TextSingle,
            "text-private" => FieldType::TextPrivate,
            "text-multi" => FieldType::TextMulti,
            "list-single" => FieldType::ListSingle,
            "list-multi" => FieldType::ListMulti,
            "jid-single" => FieldType::JidSingle,
            "jid-multi" => FieldType::JidMulti,
            "fixed" => FieldType::Fixed,
            "hidden" => FieldType::Hidden,
            _ => return None,
        })
    }

    pub fn editable(self) -> bool {
        !matches!(self, FieldType::Fixed | FieldType::Hidden)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FieldType::Boolean => "boolean",
            FieldType::TextSingle => "text-single",
            FieldType::TextPrivate => "text-private",
            FieldType::TextMulti => "text-multi",
            FieldType::ListSingle => "list-single",
            FieldType::ListMulti => "list-multi",
            FieldType::JidSingle => "jid-single",
            FieldType::JidMulti => "jid-multi",
            FieldType::Fixed => "fixed",
            FieldType::Hidden => "hidden",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormOption {
    pub label: Option<String>,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    pub var: Option<String>,
    pub label: Option<String>,
    pub field_type: FieldType,
    pub description: Option<String>,
    pub required: bool,
    pub values: Vec<String>,
    pub options: Vec<FormOption>,
    tag: Option<String>,
}

impl FormField {
    pub fn new(var: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            var: Some(var.into()),
            label: None,
            field_type,
            description: None,
            required: false,
            values: Vec::new(),
            options: Vec::new(),
            tag: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.values.push(value.into());
        self
    }

    pub fn with_option(mut self, value: impl Into<String>, label: Option<&str>) -> Self {
        self.options.push(FormOption {
            label: label.map(str::to_string),
            value: value.into(),
        });
        self
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    fn has_option(&self, value: &str) -> bool {
        self.options.iter().any(|opt| opt.value == value)
    }
}

/// Outcome of a field edit. Every variant other than `Updated` leaves the
/// form untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldEdit {
    Updated,
    NoSuchField,
    InvalidUsage,
    AlreadyPresent,
    NotPresent,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DataForm {
    pub form_type: Option<String>,
    pub title: Option<String>,
    pub instructions: Option<String>,
    fields: Vec<FormField>,
    modified: bool,
}

impl DataForm {
    /// Builds a form and assigns tags to every editable field.
    pub fn new(title: Option<String>, instructions: Option<String>, fields: Vec<FormField>) -> Self {
        let mut form = Self {
            form_type: Some("form".into()),
            title,
            instructions,
            fields,
            modified: false,
        };
        let mut next = 1;
        for field in form.fields.iter_mut() {
            field.tag = None;
            if field.field_type.editable() && field.var.is_some() {
                field.tag = Some(format!("field{next}"));
                next += 1;
            }
        }
        form
    }

    pub fn fields(&self) -> &[FormField] {
        &self.fields
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().filter_map(FormField::tag)
    }

    pub fn tag_exists(&self, tag: &str) -> bool {
        self.field(tag).is_some()
    }

    pub fn field(&self, tag: &str) -> Option<&FormField> {
        self.fields.iter().find(|f| f.tag() == Some(tag))
    }

    fn field_mut(&mut self, tag: &str) -> Option<&mut FormField> {
        self.fields.iter_mut().find(|f| f.tag() == Some(tag))
    }

    pub fn field_type(&self, tag: &str) -> Option<FieldType> {
        self.field(tag).map(|f| f.field_type)
    }

    pub fn value_count(&self, tag: &str) -> usize {
        self.field(tag).map_or(0, |f| f.values.len())
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn mark_saved(&mut self) {
        self.modified = false;
    }

    /// Applies a field command (`args` are the words after the tag) according
    /// to the field's type.
    pub fn edit(&mut self, tag: &str, args: &[&str]) -> FieldEdit {
        let Some(field) = self.field_mut(tag) else {
            return FieldEdit::NoSuchField;
        };
        let outcome = match field.field_type {
            FieldType::Boolean => match args.first() {
                Some(&"on") => set_single(field, "1"),
                Some(&"off") => set_single(field, "0"),
                _ => FieldEdit::InvalidUsage,
            },
            FieldType::TextSingle | FieldType::TextPrivate | FieldType::JidSingle => {
                match args.first() {
                    Some(value) => set_single(field, &args_tail(args, value)),
                    None => FieldEdit::InvalidUsage,
                }
            }
            FieldType::ListSingle => match args.first() {
                Some(value) if field.has_option(value) => set_single(field, value),
                _ => FieldEdit::InvalidUsage,
            },
            FieldType::TextMulti => match args {
                ["add", rest @ ..] if !rest.is_empty() => {
                    field.values.push(rest.join(" "));
                    FieldEdit::Updated
                }
                ["remove", index] => remove_indexed(field, index),
                _ => FieldEdit::InvalidUsage,
            },
            FieldType::ListMulti => match args {
                ["add", value] if field.has_option(value) => add_unique(field, value),
                ["remove", value] if field.has_option(value) => remove_value(field, value),
                _ => FieldEdit::InvalidUsage,
            },
            FieldType::JidMulti => match args {
                ["add", value] => add_unique(field, value),
                ["remove", value] => remove_value(field, value),
                _ => FieldEdit::InvalidUsage,
            },
            FieldType::Fixed | FieldType::Hidden => FieldEdit::NoSuchField,
        };
        if outcome == FieldEdit::Updated {
            self.modified = true;
        }
        outcome
    }

    /// Lines describing the current value of one field.
    pub fn describe_field(&self, tag: &str) -> Vec<String> {
        let Some(field) = self.field(tag) else {
            return Vec::new();
        };
        let label = field
            .label
            .as_deref()
            .or(field.var.as_deref())
            .unwrap_or_default();
        let required = if field.required { " (required)" } else { "" };
        let head = format!("[{tag}] {label}{required}:");
        match field.field_type {
            FieldType::Boolean => {
                let on = matches!(field.values.first().map(String::as_str), Some("1" | "true"));
                vec![format!("{head} {}", if on { "ON" } else { "OFF" })]
            }
            FieldType::TextPrivate => {
                let masked = if field.values.is_empty() { "" } else { "[hidden]" };
                vec![format!("{head} {masked}")]
            }
            FieldType::TextSingle | FieldType::JidSingle | FieldType::ListSingle => {
                vec![format!(
                    "{head} {}",
                    field.values.first().map(String::as_str).unwrap_or_default()
                )]
            }
            FieldType::TextMulti => {
                let mut lines = vec![head];
                lines.extend(
                    field
                        .values
                        .iter()
                        .enumerate()
                        .map(|(i, v)| format!("  [val{}] {v}", i + 1)),
                );
                lines
            }
            FieldType::ListMulti | FieldType::JidMulti => {
                let mut lines = vec![head];
                lines.extend(field.values.iter().map(|v| format!("  {v}")));
                lines
            }
            FieldType::Fixed | FieldType::Hidden => Vec::new(),
        }
    }

    /// Usage lines for one field.
    pub fn field_help(&self, tag: &str) -> Vec<String> {
        let Some(field) = self.field(tag) else {
            return vec![format!("No such field {tag}")];
        };
        let label = field.label.as_deref().unwrap_or(tag);
        let mut lines = vec![format!("{tag}: {label} ({})", field.field_type)];
        if let Some(desc) = &field.description {
            lines.push(format!("  Description : {desc}"));
        }
        match field.field_type {
            FieldType::Boolean => lines.push(format!("  Change value : /{tag} on|off")),
            FieldType::TextSingle | FieldType::TextPrivate | FieldType::JidSingle => {
                lines.push(format!("  Change value : /{tag} <value>"));
            }
            FieldType::ListSingle => {
                lines.push(format!("  Change value : /{tag} <option>"));
                lines.extend(options(field));
            }
            FieldType::TextMulti => {
                lines.push(format!("  Add value    : /{tag} add <value>"));
                lines.push(format!("  Remove value : /{tag} remove val<n>"));
            }
            FieldType::ListMulti => {
                lines.push(format!("  Add option    : /{tag} add <option>"));
                lines.push(format!("  Remove option : /{tag} remove <option>"));
                lines.extend(options(field));
            }
            FieldType::JidMulti => {
                lines.push(format!("  Add JID    : /{tag} add <jid>"));
                lines.push(format!("  Remove JID : /{tag} remove <jid>"));
            }
            FieldType::Fixed | FieldType::Hidden => {}
        }
        lines
    }
}

fn options(field: &FormField) -> impl Iterator<Item = String> + '_ {
    std::iter::once("  Options:".to_string()).chain(field.options.iter().map(|opt| {
        match &opt.label {
            Some(label) => format!("    {} ({label})", opt.value),
            None => format!("    {}", opt.value),
        }
    }))
}

fn args_tail(args: &[&str], first: &str) -> String {
    if args.len() > 1 {
        args.join(" ")
    } else {
        first.to_string()
    }
}

fn set_single(field: &mut FormField, value: &str) -> FieldEdit {
    field.values = vec![value.to_string()];
    FieldEdit::Updated
}

fn add_unique(field: &mut FormField, value: &str) -> FieldEdit {
    if field.values.iter().any(|v| v == value) {
        return FieldEdit::AlreadyPresent;
    }
    field.values.push(value.to_string());
    FieldEdit::Updated
}

fn remove_value(field: &mut FormField, value: &str) -> FieldEdit {
    let before = field.values.len();
    field.values.retain(|v| v != value);
    if field.values.len() == before {
        FieldEdit::NotPresent
    } else {
        FieldEdit::Updated
    }
}

fn remove_indexed(field: &mut FormField, raw: &str) -> FieldEdit {
    let index = raw
        .strip_prefix("val")
        .and_then(|n| n.parse::<usize>().ok())
        .filter(|n| (1..=field.values.len()).contains(n));
    match index {
        Some(n) => {
            field.values.remove(n - 1);
            FieldEdit::Updated
        }
        None => FieldEdit::InvalidUsage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DataForm {
        DataForm::new(
            Some("Room configuration".into()),
            None,
            vec![
                FormField::new("FORM_TYPE", FieldType::Hidden).with_value("config"),
                FormField::new("muc#roomconfig_roomname", FieldType::TextSingle)
                    .with_label("Name"),
                FormField::new("muc#roomconfig_persistentroom", FieldType::Boolean)
                    .with_value("0"),
                FormField::new("muc#roomconfig_whois", FieldType::ListSingle)
                    .with_option("moderators", None)
                    .with_option("anyone", None)
                    .with_value("moderators"),
                FormField::new("muc#roomconfig_roomdesc", FieldType::TextMulti),
                FormField::new("muc#roomconfig_roomadmins", FieldType::JidMulti),
            ],
        )
    }

    #[test]
    fn tags_skip_hidden_fields() {
        let form = sample();
        let tags: Vec<_> = form.tags().collect();
        assert_eq!(tags, vec!["field1", "field2", "field3", "field4", "field5"]);
        assert_eq!(form.field_type("field2"), Some(FieldType::Boolean));
        assert!(!form.is_modified());
    }

    #[test]
    fn boolean_and_list_single_validation() {
        let mut form = sample();
        assert_eq!(form.edit("field2", &["maybe"]), FieldEdit::InvalidUsage);
        assert!(!form.is_modified());
        assert_eq!(form.edit("field2", &["on"]), FieldEdit::Updated);
        assert!(form.is_modified());
        assert_eq!(form.edit("field3", &["nobody"]), FieldEdit::InvalidUsage);
        assert_eq!(form.edit("field3", &["anyone"]), FieldEdit::Updated);
        assert_eq!(form.field("field3").unwrap().values, vec!["anyone"]);
    }

    #[test]
    fn text_multi_add_and_remove_by_index() {
        let mut form = sample();
        assert_eq!(form.edit("field4", &["add", "first", "line"]), FieldEdit::Updated);
        assert_eq!(form.edit("field4", &["add", "second"]), FieldEdit::Updated);
        assert_eq!(form.value_count("field4"), 2);
        assert_eq!(form.edit("field4", &["remove", "val3"]), FieldEdit::InvalidUsage);
        assert_eq!(form.edit("field4", &["remove", "val1"]), FieldEdit::Updated);
        assert_eq!(form.field("field4").unwrap().values, vec!["second"]);
    }

    #[test]
    fn jid_multi_is_unique() {
        let mut form = sample();
        assert_eq!(form.edit("field5", &["add", "a@x.org"]), FieldEdit::Updated);
        assert_eq!(form.edit("field5", &["add", "a@x.org"]), FieldEdit::AlreadyPresent);
        assert_eq!(form.edit("field5", &["remove", "b@x.org"]), FieldEdit::NotPresent);
        assert_eq!(form.edit("field9", &["on"]), FieldEdit::NoSuchField);
    }

    #[test]
    fn describe_shows_values() {
        let mut form = sample();
        form.edit("field4", &["add", "hello"]);
        assert_eq!(
            form.describe_field("field4"),
            vec![
                "[field4] muc#roomconfig_roomdesc:".to_string(),
                "  [val1] hello".to_string()
            ]
        );
        assert_eq!(form.describe_field("field2"), vec!["[field2] muc#roomconfig_persistentroom: OFF"]);
    }
}
