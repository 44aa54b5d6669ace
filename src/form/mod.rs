//! 表单绑定与校验
//!
//! 表单由 [`FormSchema`] 描述：字段名、类型、校验规则，以及把值写回实体的 setter。
//! [`bind`] 读取 [`RawInput`]，把通过解析的值写入实体，同时收集每个字段的校验错误。
//! 文件字段不写入实体，绑定后通过 [`Bound::file`] 取出，由调用方决定如何保存。

pub mod input;

pub use input::RawInput;

use std::borrow::Cow;
use std::collections::HashMap;
use validator::{ValidateLength, ValidateRange, ValidationError, ValidationErrors};

use crate::upload::UploadedFile;

/// 表单级错误（不属于某个字段）的键
pub const FORM_ERRORS: &str = "__form";

/// 表单 CSRF 令牌字段名
pub const TOKEN_FIELD: &str = "_token";

/// 字段类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    TextArea,
    Decimal,
    File,
}

/// 解析后的字段值
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Decimal(f64),
}

impl FieldValue {
    pub fn into_text(self) -> Option<String> {
        match self {
            FieldValue::Text(text) => Some(text),
            FieldValue::Decimal(_) => None,
        }
    }

    pub fn as_decimal(&self) -> Option<f64> {
        match self {
            FieldValue::Decimal(value) => Some(*value),
            FieldValue::Text(_) => None,
        }
    }
}

/// 校验规则
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    Required,
    /// 字符数范围
    Length { min: Option<u64>, max: Option<u64> },
    Range { min: Option<f64>, max: Option<f64> },
    /// 文件最大字节数
    MaxFileSize(u64),
    /// 允许的 MIME 类型前缀，如 `image/`
    MimeTypes(Vec<String>),
}

/// 把值写入实体
pub type Setter<T> = fn(&mut T, Option<FieldValue>);
/// 从实体读取用于回显的值
pub type Getter<T> = fn(&T) -> Option<String>;

/// 表单字段
pub struct Field<T> {
    name: &'static str,
    label: &'static str,
    kind: FieldKind,
    rules: Vec<Rule>,
    getter: Option<Getter<T>>,
    setter: Option<Setter<T>>,
}

impl<T> Field<T> {
    fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            label: name,
            kind,
            rules: Vec::new(),
            getter: None,
            setter: None,
        }
    }

    pub fn text(name: &'static str) -> Self {
        Self::new(name, FieldKind::Text)
    }

    pub fn textarea(name: &'static str) -> Self {
        Self::new(name, FieldKind::TextArea)
    }

    pub fn decimal(name: &'static str) -> Self {
        Self::new(name, FieldKind::Decimal)
    }

    /// 文件字段不映射到实体
    pub fn file(name: &'static str) -> Self {
        Self::new(name, FieldKind::File)
    }

    pub fn label(mut self, label: &'static str) -> Self {
        self.label = label;
        self
    }

    pub fn required(self) -> Self {
        self.rule(Rule::Required)
    }

    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn map(mut self, getter: Getter<T>, setter: Setter<T>) -> Self {
        self.getter = Some(getter);
        self.setter = Some(setter);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_required(&self) -> bool {
        self.rules.contains(&Rule::Required)
    }

    fn check_text(&self, value: Option<&str>) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        for rule in &self.rules {
            match (rule, value) {
                (Rule::Required, None) => errors.push(blank()),
                (Rule::Length { min, max }, Some(text)) => {
                    if !text.validate_length(*min, *max, None) {
                        errors.push(length_error(text, *min, *max));
                    }
                }
                _ => {}
            }
        }
        errors
    }

    fn check_decimal(&self, value: Option<f64>) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        for rule in &self.rules {
            match (rule, value) {
                (Rule::Required, None) => errors.push(blank()),
                (Rule::Range { min, max }, Some(number)) => {
                    if !number.validate_range(*min, *max, None, None) {
                        errors.push(range_error(*min, *max));
                    }
                }
                _ => {}
            }
        }
        errors
    }

    fn check_file(&self, file: Option<&UploadedFile>) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        for rule in &self.rules {
            match (rule, file) {
                (Rule::Required, None) => errors.push(blank()),
                (Rule::MaxFileSize(limit), Some(file)) if file.len() > *limit => {
                    errors.push(error(
                        "max_file_size",
                        format!(
                            "The file is too large ({}). Allowed maximum size is {}.",
                            human_size(file.len()),
                            human_size(*limit)
                        ),
                    ));
                }
                (Rule::MimeTypes(allowed), Some(file)) => {
                    // 只认文件内容，识别不出的一律拒绝
                    let detected = file.detected_mime();
                    let accepted = detected.is_some_and(|mime| {
                        allowed.iter().any(|prefix| mime.starts_with(prefix.as_str()))
                    });
                    if !accepted {
                        let mime = detected.unwrap_or("application/octet-stream");
                        errors.push(error(
                            "mime_type",
                            format!(
                                "The mime type of the file is invalid (\"{}\"). Allowed mime types are \"{}\".",
                                mime,
                                allowed.join("\", \"")
                            ),
                        ));
                    }
                }
                _ => {}
            }
        }
        errors
    }
}

/// 表单定义
pub struct FormSchema<T> {
    name: &'static str,
    fields: Vec<Field<T>>,
}

/// 表单定义构建器
pub struct FormSchemaBuilder<T> {
    name: &'static str,
    fields: Vec<Field<T>>,
}

impl<T> FormSchema<T> {
    pub fn builder(name: &'static str) -> FormSchemaBuilder<T> {
        FormSchemaBuilder {
            name,
            fields: Vec::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// 请求中的完整字段名：`form[field]`
    pub fn full_name(&self, field: &str) -> String {
        format!("{}[{}]", self.name, field)
    }

    /// 表单级 CSRF 令牌字段名
    pub fn token_field(&self) -> String {
        self.full_name(TOKEN_FIELD)
    }

    /// 渲染用的视图：已提交时回显原始输入，否则从实体读取
    pub fn view(&self, bound: &Bound<T>, raw: &RawInput) -> FormView {
        let fields = self
            .fields
            .iter()
            .map(|field| {
                let full_name = self.full_name(field.name);
                let value = match field.kind {
                    FieldKind::File => None,
                    _ if bound.submitted => raw.text(&full_name).map(|v| v.to_string()),
                    _ => field.getter.and_then(|get| get(&bound.entity)),
                };
                FieldView {
                    name: field.name,
                    label: field.label,
                    kind: field.kind,
                    required: field.is_required(),
                    errors: bound.messages(field.name),
                    full_name,
                    value,
                }
            })
            .collect();

        FormView {
            name: self.name,
            fields,
            errors: bound.messages(FORM_ERRORS),
            token_field: self.token_field(),
            submitted: bound.submitted,
        }
    }
}

impl<T> FormSchemaBuilder<T> {
    pub fn field(mut self, field: Field<T>) -> Self {
        self.fields.push(field);
        self
    }

    pub fn build(self) -> FormSchema<T> {
        FormSchema {
            name: self.name,
            fields: self.fields,
        }
    }
}

/// 绑定结果
#[derive(Debug)]
pub struct Bound<T> {
    pub entity: T,
    pub errors: ValidationErrors,
    pub submitted: bool,
    files: HashMap<&'static str, UploadedFile>,
}

impl<T> Bound<T> {
    /// 已提交且没有任何错误
    pub fn is_valid(&self) -> bool {
        self.submitted && self.errors.is_empty()
    }

    pub fn file(&self, field: &str) -> Option<&UploadedFile> {
        self.files.get(field)
    }

    pub fn take_file(&mut self, field: &str) -> Option<UploadedFile> {
        self.files.remove(field)
    }

    pub fn add_form_error(&mut self, message: impl Into<String>) {
        self.errors.add(FORM_ERRORS, error("form", message.into()));
    }

    /// 某个字段的错误消息
    pub fn messages(&self, field: &str) -> Vec<String> {
        self.errors
            .field_errors()
            .get(field)
            .map(|errors| {
                errors
                    .iter()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| e.code.to_string())
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// 把原始输入绑定到实体上
pub fn bind<T>(schema: &FormSchema<T>, mut entity: T, raw: &RawInput) -> Bound<T> {
    let submitted = raw.is_submitted(schema.name);
    let mut errors = ValidationErrors::new();
    let mut files = HashMap::new();

    if !submitted {
        return Bound {
            entity,
            errors,
            submitted,
            files,
        };
    }

    for field in &schema.fields {
        let full_name = schema.full_name(field.name);
        let field_errors = match field.kind {
            FieldKind::File => {
                let file = raw.file(&full_name).filter(|f| !f.is_empty()).cloned();
                let field_errors = field.check_file(file.as_ref());
                if let Some(file) = file {
                    files.insert(field.name, file);
                }
                field_errors
            }
            FieldKind::Text | FieldKind::TextArea => {
                let text = raw
                    .text(&full_name)
                    .map(str::trim)
                    .filter(|v| !v.is_empty());
                if let Some(set) = field.setter {
                    set(&mut entity, text.map(|v| FieldValue::Text(v.to_string())));
                }
                field.check_text(text)
            }
            FieldKind::Decimal => {
                let text = raw
                    .text(&full_name)
                    .map(str::trim)
                    .filter(|v| !v.is_empty());
                match text.map(parse_decimal) {
                    Some(None) => vec![error("not_a_number", "Please enter a number.".to_string())],
                    parsed => {
                        let number = parsed.flatten();
                        if let Some(set) = field.setter {
                            set(&mut entity, number.map(FieldValue::Decimal));
                        }
                        field.check_decimal(number)
                    }
                }
            }
        };

        for err in field_errors {
            errors.add(field.name, err);
        }
    }

    Bound {
        entity,
        errors,
        submitted,
        files,
    }
}

/// 渲染用的表单
#[derive(Debug, Clone)]
pub struct FormView {
    pub name: &'static str,
    pub fields: Vec<FieldView>,
    pub errors: Vec<String>,
    pub token_field: String,
    pub submitted: bool,
}

#[derive(Debug, Clone)]
pub struct FieldView {
    pub name: &'static str,
    pub full_name: String,
    pub label: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub value: Option<String>,
    pub errors: Vec<String>,
}

impl FormView {
    pub fn field(&self, name: &str) -> Option<&FieldView> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_file_field(&self) -> bool {
        self.fields.iter().any(|f| f.kind == FieldKind::File)
    }
}

fn parse_decimal(text: &str) -> Option<f64> {
    text.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn error(code: &'static str, message: String) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Owned(message));
    err
}

fn blank() -> ValidationError {
    error("required", "This value should not be blank.".to_string())
}

fn length_error(text: &str, min: Option<u64>, max: Option<u64>) -> ValidationError {
    let count = text.chars().count() as u64;
    match (min, max) {
        (Some(min), _) if count < min => error(
            "length",
            format!("This value is too short. It should have {} characters or more.", min),
        ),
        (_, Some(max)) => error(
            "length",
            format!("This value is too long. It should have {} characters or less.", max),
        ),
        _ => error("length", "This value has an invalid length.".to_string()),
    }
}

fn range_error(min: Option<f64>, max: Option<f64>) -> ValidationError {
    let message = match (min, max) {
        (Some(min), Some(max)) => format!("This value should be between {} and {}.", min, max),
        (Some(min), None) => format!("This value should be {} or more.", min),
        (None, Some(max)) => format!("This value should be {} or less.", max),
        (None, None) => "This value is out of range.".to_string(),
    };
    error("range", message)
}

fn human_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * 1024;
    if bytes >= MIB {
        format!("{:.1} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, Clone)]
    struct Item {
        title: String,
        weight: f64,
        note: Option<String>,
    }

    fn item_form() -> FormSchema<Item> {
        FormSchema::builder("item")
            .field(
                Field::text("title")
                    .required()
                    .rule(Rule::Length {
                        min: Some(2),
                        max: Some(10),
                    })
                    .map(
                        |i: &Item| Some(i.title.clone()),
                        |i, v| i.title = v.and_then(FieldValue::into_text).unwrap_or_default(),
                    ),
            )
            .field(
                Field::decimal("weight")
                    .required()
                    .rule(Rule::Range {
                        min: Some(0.0),
                        max: Some(100.0),
                    })
                    .map(
                        |i: &Item| Some(i.weight.to_string()),
                        |i, v| i.weight = v.and_then(|v| v.as_decimal()).unwrap_or_default(),
                    ),
            )
            .field(Field::textarea("note").map(
                |i: &Item| i.note.clone(),
                |i, v| i.note = v.and_then(FieldValue::into_text),
            ))
            .field(
                Field::file("attachment")
                    .rule(Rule::MaxFileSize(16))
                    .rule(Rule::MimeTypes(vec!["image/".to_string()])),
            )
            .build()
    }

    #[test]
    fn test_not_submitted_keeps_entity() {
        let schema = item_form();
        let entity = Item {
            title: "Kept".to_string(),
            ..Item::default()
        };
        let bound = bind(&schema, entity, &RawInput::new().with_text("other", "x"));

        assert!(!bound.submitted);
        assert!(!bound.is_valid());
        assert!(bound.errors.is_empty());
        assert_eq!(bound.entity.title, "Kept");
    }

    #[test]
    fn test_valid_submission() {
        let schema = item_form();
        let raw = RawInput::new()
            .with_text("item[title]", "  Anvil ")
            .with_text("item[weight]", "42.5")
            .with_text("item[note]", "");

        let bound = bind(&schema, Item::default(), &raw);
        assert!(bound.is_valid());
        assert_eq!(bound.entity.title, "Anvil");
        assert_eq!(bound.entity.weight, 42.5);
        assert_eq!(bound.entity.note, None);
    }

    #[test]
    fn test_blank_and_length_errors() {
        let schema = item_form();
        let raw = RawInput::new()
            .with_text("item[title]", "A")
            .with_text("item[weight]", "  ");

        let bound = bind(&schema, Item::default(), &raw);
        assert!(!bound.is_valid());
        assert_eq!(
            bound.messages("title"),
            vec!["This value is too short. It should have 2 characters or more."]
        );
        assert_eq!(bound.messages("weight"), vec!["This value should not be blank."]);

        let raw = RawInput::new()
            .with_text("item[title]", "Much too long title")
            .with_text("item[weight]", "1");
        let bound = bind(&schema, Item::default(), &raw);
        assert_eq!(
            bound.messages("title"),
            vec!["This value is too long. It should have 10 characters or less."]
        );
    }

    #[test]
    fn test_decimal_errors() {
        let schema = item_form();
        let raw = RawInput::new()
            .with_text("item[title]", "Anvil")
            .with_text("item[weight]", "heavy");
        let bound = bind(&schema, Item::default(), &raw);
        assert_eq!(bound.messages("weight"), vec!["Please enter a number."]);

        let raw = RawInput::new()
            .with_text("item[title]", "Anvil")
            .with_text("item[weight]", "250");
        let bound = bind(&schema, Item::default(), &raw);
        assert_eq!(
            bound.messages("weight"),
            vec!["This value should be between 0 and 100."]
        );
    }

    #[test]
    fn test_file_rules_and_unmapped_file() {
        let schema = item_form();
        let png = UploadedFile::new("a.png", None, b"\x89PNG\r\n\x1a\n".to_vec());
        let raw = RawInput::new()
            .with_text("item[title]", "Anvil")
            .with_text("item[weight]", "3")
            .with_file("item[attachment]", png.clone());
        let bound = bind(&schema, Item::default(), &raw);
        assert!(bound.is_valid());
        assert_eq!(bound.file("attachment"), Some(&png));

        let pdf = UploadedFile::new("a.png", Some("image/png".to_string()), b"%PDF-1.4".to_vec());
        let mut padded = b"\x89PNG\r\n\x1a\n".to_vec();
        padded.resize(64, 0);
        let big = UploadedFile::new("b.png", None, padded);
        for file in [pdf, big] {
            let raw = RawInput::new()
                .with_text("item[title]", "Anvil")
                .with_text("item[weight]", "3")
                .with_file("item[attachment]", file);
            let bound = bind(&schema, Item::default(), &raw);
            assert!(!bound.is_valid());
            assert_eq!(bound.messages("attachment").len(), 1);
        }
    }

    #[test]
    fn test_mime_type_comes_from_content() {
        let schema = item_form();
        let disguised = UploadedFile::new(
            "x.png",
            Some("image/png".to_string()),
            b"<script>alert(1)</script>".to_vec(),
        );
        let svg = UploadedFile::new(
            "x.svg",
            Some("image/svg+xml".to_string()),
            br#"<svg onload="alert(1)"/>"#.to_vec(),
        );
        for file in [disguised, svg] {
            let raw = RawInput::new()
                .with_text("item[title]", "Anvil")
                .with_text("item[weight]", "3")
                .with_file("item[attachment]", file);
            let bound = bind(&schema, Item::default(), &raw);
            assert!(!bound.is_valid());
            assert_eq!(bound.messages("attachment").len(), 1);
            assert!(bound.messages("attachment")[0]
                .starts_with("The mime type of the file is invalid"));
        }
    }

    #[test]
    fn test_empty_file_part_is_ignored() {
        let schema = item_form();
        let raw = RawInput::new()
            .with_text("item[title]", "Anvil")
            .with_text("item[weight]", "3")
            .with_file("item[attachment]", UploadedFile::new("", None, Vec::new()));
        let bound = bind(&schema, Item::default(), &raw);
        assert!(bound.is_valid());
        assert!(bound.file("attachment").is_none());
    }

    #[test]
    fn test_form_error_and_view() {
        let schema = item_form();
        let raw = RawInput::new()
            .with_text("item[title]", "Anvil")
            .with_text("item[weight]", "abc");
        let mut bound = bind(&schema, Item::default(), &raw);
        bound.add_form_error("The CSRF token is invalid. Please try to resubmit the form.");

        let view = schema.view(&bound, &raw);
        assert_eq!(view.errors.len(), 1);
        assert_eq!(view.token_field, "item[_token]");
        assert!(view.has_file_field());
        let weight = view.field("weight").unwrap();
        assert_eq!(weight.value.as_deref(), Some("abc"));
        assert_eq!(weight.full_name, "item[weight]");
        assert!(weight.required);
        assert_eq!(weight.errors, vec!["Please enter a number."]);
    }

    #[test]
    fn test_view_reads_entity_when_not_submitted() {
        let schema = item_form();
        let entity = Item {
            title: "Anvil".to_string(),
            weight: 7.0,
            note: Some("iron".to_string()),
        };
        let raw = RawInput::new();
        let bound = bind(&schema, entity, &raw);
        let view = schema.view(&bound, &raw);

        assert_eq!(view.field("title").unwrap().value.as_deref(), Some("Anvil"));
        assert_eq!(view.field("weight").unwrap().value.as_deref(), Some("7"));
        assert_eq!(view.field("note").unwrap().value.as_deref(), Some("iron"));
        assert_eq!(view.field("attachment").unwrap().value, None);
    }
}
