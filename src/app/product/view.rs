//! 产品页面渲染

use html_escape::{encode_double_quoted_attribute as attr, encode_text as text};
use std::fmt::Write;

use super::form::FORM_NAME;
use super::model::Product;
use super::service::{delete_token_id, FormMode, FormPage};
use crate::core::context::{Flash, RequestContext};
use crate::form::{FieldKind, FieldView, TOKEN_FIELD};

const STYLE: &str = r#"
        body { font-family: Arial, sans-serif; margin: 40px; background: #f5f5f5; }
        .container {
            max-width: 960px; margin: 0 auto; background: white; padding: 30px;
            border-radius: 10px; box-shadow: 0 2px 10px rgba(0,0,0,0.1);
        }
        table { width: 100%; border-collapse: collapse; }
        th, td { padding: 8px; border-bottom: 1px solid #eee; text-align: left; }
        .flash { padding: 10px 15px; margin: 10px 0; border-radius: 5px; }
        .flash-success { background: #e6f4ea; border-left: 4px solid #28a745; }
        .flash-error { background: #fdecea; border-left: 4px solid #dc3545; }
        .errors { color: #dc3545; margin: 4px 0; padding-left: 18px; }
        .field { margin: 15px 0; }
        .field label { display: block; font-weight: bold; margin-bottom: 5px; }
        .thumb { max-width: 80px; max-height: 80px; }
        form.inline { display: inline; }
        a { color: #007bff; text-decoration: none; }
"#;

fn layout(title: &str, flashes: &[Flash], content: &str) -> String {
    let mut messages = String::new();
    for flash in flashes {
        let _ = write!(
            messages,
            r#"<div class="flash flash-{}">{}</div>"#,
            flash.level,
            text(&flash.message)
        );
    }

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>{title}</title>
    <meta charset="UTF-8">
    <style>{style}</style>
</head>
<body>
    <div class="container">
        <h1>{title}</h1>
        {messages}
        {content}
    </div>
</body>
</html>
"#,
        title = text(title),
        style = STYLE,
        messages = messages,
        content = content,
    )
}

fn delete_form(ctx: &RequestContext, id: i64) -> String {
    format!(
        r#"<form class="inline" method="post" action="/product/delete/{id}"
            onsubmit="return confirm('Are you sure you want to delete this item?');">
            <input type="hidden" name="{field}" value="{token}">
            <button type="submit">Delete</button>
        </form>"#,
        id = id,
        field = TOKEN_FIELD,
        token = ctx.csrf_token(&delete_token_id(id)),
    )
}

fn image_url(file_name: &str) -> String {
    format!("/uploads/{}", attr(file_name))
}

/// 列表页
pub fn index_page(ctx: &RequestContext, products: &[Product], flashes: &[Flash]) -> String {
    let mut rows = String::new();
    for product in products {
        let Some(id) = product.id else { continue };
        let image = product
            .image
            .as_deref()
            .map(|img| format!(r#"<img class="thumb" src="{}" alt="">"#, image_url(img)))
            .unwrap_or_default();
        let _ = write!(
            rows,
            r#"<tr>
                <td>{id}</td>
                <td>{name}</td>
                <td>{price}</td>
                <td>{description}</td>
                <td>{image}</td>
                <td><a href="/product/edit/{id}">Edit</a> {delete}</td>
            </tr>"#,
            id = id,
            name = text(&product.name),
            price = product.price_text(),
            description = text(product.description.as_deref().unwrap_or_default()),
            image = image,
            delete = delete_form(ctx, id),
        );
    }

    if products.is_empty() {
        rows.push_str(r#"<tr><td colspan="6">No records found</td></tr>"#);
    }

    let content = format!(
        r#"<table>
            <thead>
                <tr>
                    <th>Id</th><th>Name</th><th>Price</th>
                    <th>Description</th><th>Image</th><th>Actions</th>
                </tr>
            </thead>
            <tbody>{}</tbody>
        </table>
        <p><a href="/product/new">Create new</a></p>"#,
        rows
    );

    layout("Product index", flashes, &content)
}

fn errors_list(errors: &[String]) -> String {
    if errors.is_empty() {
        return String::new();
    }
    let items: String = errors
        .iter()
        .map(|e| format!("<li>{}</li>", text(e)))
        .collect();
    format!(r#"<ul class="errors">{}</ul>"#, items)
}

fn field_widget(field: &FieldView) -> String {
    let required = if field.required { " required" } else { "" };
    let value = field.value.as_deref().unwrap_or_default();
    let name = attr(&field.full_name);
    let id = format!("{}_{}", FORM_NAME, field.name);

    let input = match field.kind {
        FieldKind::Text => format!(
            r#"<input type="text" id="{id}" name="{name}" value="{}"{required}>"#,
            attr(value)
        ),
        FieldKind::Decimal => format!(
            r#"<input type="text" inputmode="decimal" id="{id}" name="{name}" value="{}"{required}>"#,
            attr(value)
        ),
        FieldKind::TextArea => format!(
            r#"<textarea id="{id}" name="{name}"{required}>{}</textarea>"#,
            text(value)
        ),
        FieldKind::File => format!(r#"<input type="file" id="{id}" name="{name}"{required}>"#),
    };

    format!(
        r#"<div class="field">
            <label for="{id}">{label}</label>
            {errors}
            {input}
        </div>"#,
        id = id,
        label = text(field.label),
        errors = errors_list(&field.errors),
        input = input,
    )
}

/// 新建/编辑表单页
pub fn form_page(ctx: &RequestContext, page: &FormPage, flashes: &[Flash]) -> String {
    let form = &page.form;
    let (title, action, button) = match &page.mode {
        FormMode::New => (
            "Create new Product",
            "/product/new".to_string(),
            "Save",
        ),
        FormMode::Edit { id, .. } => (
            "Edit Product",
            format!("/product/edit/{}", id),
            "Update",
        ),
    };

    let enctype = if form.has_file_field() {
        r#" enctype="multipart/form-data""#
    } else {
        ""
    };

    let fields: String = form.fields.iter().map(field_widget).collect();

    let mut content = format!(
        r#"<form method="post" action="{action}"{enctype} novalidate>
            {errors}
            {fields}
            <input type="hidden" name="{token_field}" value="{token}">
            <button type="submit">{button}</button>
        </form>"#,
        action = action,
        enctype = enctype,
        errors = errors_list(&form.errors),
        fields = fields,
        token_field = attr(&form.token_field),
        token = ctx.csrf_token(FORM_NAME),
        button = button,
    );

    if let FormMode::Edit { id, image } = &page.mode {
        if let Some(image) = image {
            let _ = write!(
                content,
                r#"<p>Current image: <img class="thumb" src="{}" alt=""></p>"#,
                image_url(image)
            );
        }
        content.push_str(&delete_form(ctx, *id));
    }

    content.push_str(r#"<p><a href="/product">back to list</a></p>"#);

    layout(title, flashes, &content)
}
