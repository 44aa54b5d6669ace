//! 产品业务服务
//!
//! 每个操作按同一顺序执行：绑定表单 → 校验 → 保存上传图片（失败不影响保存）→ 持久化 →
//! 写入提示消息 → 重定向回列表页。请求上下文以参数传入，服务本身不持有请求状态。

use std::sync::Arc;
use tracing::{info, warn};

use super::form::{FORM_NAME, IMAGE_FIELD};
use super::model::Product;
use super::repository::ProductRepository;
use crate::core::context::{FlashLevel, RequestContext};
use crate::core::error::CoreError;
use crate::form::{bind, Bound, FormSchema, FormView, RawInput, TOKEN_FIELD};
use crate::upload::{store_upload, FileStore, UploadedFile};

/// 列表页路径
pub const INDEX_PATH: &str = "/product";

pub const MSG_CREATED: &str = "Product created successfully!";
pub const MSG_UPDATED: &str = "Product updated successfully!";
pub const MSG_DELETED: &str = "Product deleted successfully!";
pub const MSG_INVALID_CSRF: &str = "Invalid CSRF token.";
pub const MSG_INVALID_FORM_CSRF: &str =
    "The CSRF token is invalid. Please try to resubmit the form.";

/// 删除操作的 CSRF 令牌 ID
pub fn delete_token_id(id: i64) -> String {
    format!("delete{}", id)
}

/// 表单页面类型
#[derive(Debug, Clone, PartialEq)]
pub enum FormMode {
    New,
    Edit { id: i64, image: Option<String> },
}

/// 表单页面
#[derive(Debug, Clone)]
pub struct FormPage {
    pub mode: FormMode,
    pub form: FormView,
}

/// 操作结果，由处理器渲染成响应
#[derive(Debug, Clone)]
pub enum Outcome {
    Index(Vec<Product>),
    Form(FormPage),
    Redirect(&'static str),
}

#[derive(Clone)]
pub struct ProductService {
    repository: Arc<dyn ProductRepository>,
    files: Arc<dyn FileStore>,
    form: Arc<FormSchema<Product>>,
}

impl ProductService {
    pub fn new(
        repository: Arc<dyn ProductRepository>,
        files: Arc<dyn FileStore>,
        form: FormSchema<Product>,
    ) -> Self {
        Self {
            repository,
            files,
            form: Arc::new(form),
        }
    }

    pub fn repository(&self) -> &Arc<dyn ProductRepository> {
        &self.repository
    }

    /// 产品列表
    pub async fn list(&self, _ctx: &mut RequestContext) -> Result<Outcome, CoreError> {
        let products = self.repository.find_all().await?;
        Ok(Outcome::Index(products))
    }

    /// 新建产品
    pub async fn create(
        &self,
        ctx: &mut RequestContext,
        input: RawInput,
    ) -> Result<Outcome, CoreError> {
        let mut bound = bind(&self.form, Product::default(), &input);
        self.check_form_token(ctx, &mut bound, &input);

        if !bound.is_valid() {
            return Ok(self.form_page(FormMode::New, &bound, &input));
        }

        let image = bound.take_file(IMAGE_FIELD);
        let mut product = bound.entity;
        if let Some(file) = image {
            self.handle_upload(ctx, &mut product, &file).await;
        }

        let product = self.repository.insert(product).await?;
        info!(id = ?product.id, name = %product.name, "product created");

        ctx.add_flash(FlashLevel::Success, MSG_CREATED);
        Ok(Outcome::Redirect(INDEX_PATH))
    }

    /// 编辑产品，绑定在已有记录的副本上，校验通过才写回
    pub async fn edit(
        &self,
        ctx: &mut RequestContext,
        id: i64,
        input: RawInput,
    ) -> Result<Outcome, CoreError> {
        let existing = self.load(id).await?;
        let mode = FormMode::Edit {
            id,
            image: existing.image.clone(),
        };

        let mut bound = bind(&self.form, existing, &input);
        self.check_form_token(ctx, &mut bound, &input);

        if !bound.is_valid() {
            return Ok(self.form_page(mode, &bound, &input));
        }

        let image = bound.take_file(IMAGE_FIELD);
        let mut product = bound.entity;
        if let Some(file) = image {
            self.handle_upload(ctx, &mut product, &file).await;
        }

        self.repository.update(&product).await?;
        info!(id, name = %product.name, "product updated");

        ctx.add_flash(FlashLevel::Success, MSG_UPDATED);
        Ok(Outcome::Redirect(INDEX_PATH))
    }

    /// 删除产品，令牌只对 `delete{id}` 有效
    pub async fn delete(
        &self,
        ctx: &mut RequestContext,
        id: i64,
        input: RawInput,
    ) -> Result<Outcome, CoreError> {
        self.load(id).await?;

        if ctx.is_csrf_token_valid(&delete_token_id(id), input.text(TOKEN_FIELD)) {
            self.repository.remove(id).await?;
            info!(id, "product deleted");
            ctx.add_flash(FlashLevel::Success, MSG_DELETED);
        } else {
            warn!(id, "rejected product delete with invalid CSRF token");
            ctx.add_flash(FlashLevel::Error, MSG_INVALID_CSRF);
        }

        Ok(Outcome::Redirect(INDEX_PATH))
    }

    async fn load(&self, id: i64) -> Result<Product, CoreError> {
        self.repository
            .find(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Product {} not found", id)))
    }

    fn check_form_token(&self, ctx: &RequestContext, bound: &mut Bound<Product>, input: &RawInput) {
        if bound.submitted
            && !ctx.is_csrf_token_valid(FORM_NAME, input.text(&self.form.token_field()))
        {
            bound.add_form_error(MSG_INVALID_FORM_CSRF);
        }
    }

    /// 保存上传的图片。失败时只记录提示消息，`image` 保持原值
    async fn handle_upload(
        &self,
        ctx: &mut RequestContext,
        product: &mut Product,
        file: &UploadedFile,
    ) {
        match store_upload(self.files.as_ref(), file).await {
            Ok(file_name) => {
                info!(original = %file.file_name, stored = %file_name, "image uploaded");
                product.image = Some(file_name);
            }
            Err(e) => {
                warn!(original = %file.file_name, "image upload failed: {}", e);
                ctx.add_flash(FlashLevel::Error, format!("Image upload failed: {}", e));
            }
        }
    }

    fn form_page(&self, mode: FormMode, bound: &Bound<Product>, input: &RawInput) -> Outcome {
        Outcome::Form(FormPage {
            mode,
            form: self.form.view(bound, input),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::product::form::product_form;
    use crate::app::product::repository::InMemoryProductRepository;
    use crate::config::UploadConfig;
    use crate::core::context::Flash;
    use crate::upload::LocalFileStore;
    use tempfile::TempDir;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\x00\x00\x00\rIHDR";

    struct Fixture {
        service: ProductService,
        repository: Arc<InMemoryProductRepository>,
        uploads: std::path::PathBuf,
        _dir: TempDir,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let uploads = dir.path().join("uploads");
        fixture_with_store(dir, uploads)
    }

    /// 上传目录被同名文件占用，写入必然失败
    fn broken_upload_fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let uploads = dir.path().join("uploads");
        std::fs::write(&uploads, b"occupied").unwrap();
        fixture_with_store(dir, uploads)
    }

    fn fixture_with_store(dir: TempDir, uploads: std::path::PathBuf) -> Fixture {
        let repository = Arc::new(InMemoryProductRepository::new());
        let service = ProductService::new(
            repository.clone(),
            Arc::new(LocalFileStore::new(uploads.clone())),
            product_form(&UploadConfig::default()),
        );
        Fixture {
            service,
            repository,
            uploads,
            _dir: dir,
        }
    }

    fn submission(ctx: &RequestContext, name: &str, price: &str) -> RawInput {
        RawInput::new()
            .with_text("product[name]", name)
            .with_text("product[price]", price)
            .with_text("product[description]", "")
            .with_text("product[_token]", ctx.csrf_token(FORM_NAME))
    }

    fn with_image(input: RawInput, file_name: &str) -> RawInput {
        input.with_file(
            "product[image]",
            UploadedFile::new(file_name, Some("image/png".to_string()), PNG.to_vec()),
        )
    }

    fn levels(flashes: &[Flash]) -> Vec<FlashLevel> {
        flashes.iter().map(|f| f.level).collect()
    }

    #[tokio::test]
    async fn test_list_empty() {
        let f = fixture();
        let mut ctx = RequestContext::fresh();
        match f.service.list(&mut ctx).await.unwrap() {
            Outcome::Index(products) => assert!(products.is_empty()),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_create_valid() {
        let f = fixture();
        let mut ctx = RequestContext::fresh();
        let input = submission(&ctx, "Desk lamp", "19.99");

        let outcome = f.service.create(&mut ctx, input).await.unwrap();
        assert!(matches!(outcome, Outcome::Redirect(INDEX_PATH)));

        let product = f.repository.find(1).await.unwrap().unwrap();
        assert_eq!(product.name, "Desk lamp");
        assert_eq!(product.price, 19.99);
        assert_eq!(product.description, None);
        assert_eq!(product.image, None);
        assert_eq!(ctx.flashes()[0].message, MSG_CREATED);
    }

    #[tokio::test]
    async fn test_create_get_renders_empty_form() {
        let f = fixture();
        let mut ctx = RequestContext::fresh();
        match f.service.create(&mut ctx, RawInput::new()).await.unwrap() {
            Outcome::Form(page) => {
                assert_eq!(page.mode, FormMode::New);
                assert!(!page.form.submitted);
                assert!(page.form.fields.iter().all(|field| field.errors.is_empty()));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(f.repository.len().await, 0);
    }

    #[tokio::test]
    async fn test_create_invalid_rerenders_with_errors() {
        let f = fixture();
        let mut ctx = RequestContext::fresh();
        let input = submission(&ctx, "", "cheap");

        match f.service.create(&mut ctx, input).await.unwrap() {
            Outcome::Form(page) => {
                assert!(page.form.submitted);
                assert_eq!(
                    page.form.field("name").unwrap().errors,
                    vec!["This value should not be blank."]
                );
                assert_eq!(
                    page.form.field("price").unwrap().errors,
                    vec!["Please enter a number."]
                );
                assert_eq!(page.form.field("price").unwrap().value.as_deref(), Some("cheap"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(f.repository.len().await, 0);
        assert!(ctx.flashes().is_empty());
    }

    #[tokio::test]
    async fn test_create_with_bad_form_token() {
        let f = fixture();
        let mut ctx = RequestContext::fresh();
        let input = RawInput::new()
            .with_text("product[name]", "Desk")
            .with_text("product[price]", "10")
            .with_text("product[_token]", RequestContext::fresh().csrf_token(FORM_NAME));

        match f.service.create(&mut ctx, input).await.unwrap() {
            Outcome::Form(page) => assert_eq!(page.form.errors, vec![MSG_INVALID_FORM_CSRF]),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(f.repository.len().await, 0);
    }

    #[tokio::test]
    async fn test_create_with_image() {
        let f = fixture();
        let mut ctx = RequestContext::fresh();
        let input = with_image(submission(&ctx, "Camera", "250"), "My Photo.png");

        f.service.create(&mut ctx, input).await.unwrap();

        let product = f.repository.find(1).await.unwrap().unwrap();
        let image = product.image.expect("image stored");
        let token = image
            .strip_prefix("my-photo-")
            .and_then(|rest| rest.strip_suffix(".png"))
            .expect("unexpected file name");
        assert_eq!(token.len(), 13);
        assert_eq!(std::fs::read(f.uploads.join(&image)).unwrap(), PNG);
        assert_eq!(levels(ctx.flashes()), vec![FlashLevel::Success]);
    }

    #[tokio::test]
    async fn test_create_upload_failure_still_saves() {
        let f = broken_upload_fixture();
        let mut ctx = RequestContext::fresh();
        let input = with_image(submission(&ctx, "Camera", "250"), "My Photo.png");

        let outcome = f.service.create(&mut ctx, input).await.unwrap();
        assert!(matches!(outcome, Outcome::Redirect(INDEX_PATH)));

        let product = f.repository.find(1).await.unwrap().unwrap();
        assert_eq!(product.name, "Camera");
        assert_eq!(product.image, None);

        let flashes = ctx.take_flashes();
        assert_eq!(levels(&flashes), vec![FlashLevel::Error, FlashLevel::Success]);
        assert!(flashes[0].message.starts_with("Image upload failed: "));
    }

    #[tokio::test]
    async fn test_edit_missing_product() {
        let f = fixture();
        let mut ctx = RequestContext::fresh();
        let err = f.service.edit(&mut ctx, 7, RawInput::new()).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_edit_renders_current_values() {
        let f = fixture();
        f.repository
            .insert(Product::new("Desk", 120.0).with_image("desk-00000000000aa.png"))
            .await
            .unwrap();
        let mut ctx = RequestContext::fresh();

        match f.service.edit(&mut ctx, 1, RawInput::new()).await.unwrap() {
            Outcome::Form(page) => {
                assert_eq!(
                    page.mode,
                    FormMode::Edit {
                        id: 1,
                        image: Some("desk-00000000000aa.png".to_string())
                    }
                );
                assert_eq!(page.form.field("name").unwrap().value.as_deref(), Some("Desk"));
                assert_eq!(page.form.field("price").unwrap().value.as_deref(), Some("120.00"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_edit_valid_updates() {
        let f = fixture();
        f.repository.insert(Product::new("Desk", 120.0)).await.unwrap();
        let mut ctx = RequestContext::fresh();
        let input = submission(&ctx, "Standing desk", "340.5");

        let outcome = f.service.edit(&mut ctx, 1, input).await.unwrap();
        assert!(matches!(outcome, Outcome::Redirect(INDEX_PATH)));

        let product = f.repository.find(1).await.unwrap().unwrap();
        assert_eq!(product.name, "Standing desk");
        assert_eq!(product.price, 340.5);
        assert_eq!(ctx.flashes()[0].message, MSG_UPDATED);
    }

    #[tokio::test]
    async fn test_edit_invalid_leaves_record() {
        let f = fixture();
        f.repository.insert(Product::new("Desk", 120.0)).await.unwrap();
        let mut ctx = RequestContext::fresh();
        let input = submission(&ctx, "D", "120");

        let outcome = f.service.edit(&mut ctx, 1, input).await.unwrap();
        assert!(matches!(outcome, Outcome::Form(_)));
        assert_eq!(f.repository.find(1).await.unwrap().unwrap().name, "Desk");
    }

    #[tokio::test]
    async fn test_edit_upload_failure_keeps_prior_image() {
        let f = broken_upload_fixture();
        f.repository
            .insert(Product::new("Desk", 120.0).with_image("desk-00000000000aa.png"))
            .await
            .unwrap();
        let mut ctx = RequestContext::fresh();
        let input = with_image(submission(&ctx, "Desk v2", "130"), "new.png");

        f.service.edit(&mut ctx, 1, input).await.unwrap();

        let product = f.repository.find(1).await.unwrap().unwrap();
        assert_eq!(product.name, "Desk v2");
        assert_eq!(product.image.as_deref(), Some("desk-00000000000aa.png"));
        assert_eq!(
            levels(ctx.flashes()),
            vec![FlashLevel::Error, FlashLevel::Success]
        );
    }

    #[tokio::test]
    async fn test_edit_upload_replaces_image() {
        let f = fixture();
        f.repository
            .insert(Product::new("Desk", 120.0).with_image("old-00000000000aa.png"))
            .await
            .unwrap();
        let mut ctx = RequestContext::fresh();
        let input = with_image(submission(&ctx, "Desk", "120"), "My Photo.png");

        let outcome = f.service.edit(&mut ctx, 1, input).await.unwrap();
        assert!(matches!(outcome, Outcome::Redirect(INDEX_PATH)));

        let image = f.repository.find(1).await.unwrap().unwrap().image.unwrap();
        let token = image
            .strip_prefix("my-photo-")
            .and_then(|rest| rest.strip_suffix(".png"))
            .expect("unexpected file name");
        assert_eq!(token.len(), 13);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(std::fs::read(f.uploads.join(&image)).unwrap(), PNG);
        assert_eq!(levels(ctx.flashes()), vec![FlashLevel::Success]);
    }

    #[tokio::test]
    async fn test_upload_judged_by_content() {
        let f = fixture();
        let files = [
            UploadedFile::new(
                "x.svg",
                Some("image/svg+xml".to_string()),
                br#"<svg xmlns="http://www.w3.org/2000/svg" onload="alert(document.cookie)"/>"#
                    .to_vec(),
            ),
            UploadedFile::new(
                "x.png",
                Some("image/png".to_string()),
                b"<html><script>alert(1)</script></html>".to_vec(),
            ),
        ];

        for file in files {
            let mut ctx = RequestContext::fresh();
            let input = submission(&ctx, "Camera", "250").with_file("product[image]", file);
            match f.service.create(&mut ctx, input).await.unwrap() {
                Outcome::Form(page) => {
                    assert_eq!(page.form.field("image").unwrap().errors.len(), 1);
                }
                other => panic!("unexpected outcome: {:?}", other),
            }
        }

        assert_eq!(f.repository.len().await, 0);
        assert!(!f.uploads.exists());
    }

    #[tokio::test]
    async fn test_delete_with_valid_token() {
        let f = fixture();
        for i in 1..=6 {
            f.repository
                .insert(Product::new(format!("Item {}", i), i as f64))
                .await
                .unwrap();
        }
        let before = f.repository.find_all().await.unwrap();
        let mut ctx = RequestContext::fresh();
        let input = RawInput::new().with_text("_token", ctx.csrf_token("delete5"));

        let outcome = f.service.delete(&mut ctx, 5, input).await.unwrap();
        assert!(matches!(outcome, Outcome::Redirect(INDEX_PATH)));

        assert!(f.repository.find(5).await.unwrap().is_none());
        let after = f.repository.find_all().await.unwrap();
        let expected: Vec<Product> = before.into_iter().filter(|p| p.id != Some(5)).collect();
        assert_eq!(after, expected);
        assert_eq!(ctx.flashes()[0].message, MSG_DELETED);
    }

    #[tokio::test]
    async fn test_delete_with_wrong_or_missing_token() {
        let f = fixture();
        for i in 1..=6 {
            f.repository
                .insert(Product::new(format!("Item {}", i), i as f64))
                .await
                .unwrap();
        }
        let before = f.repository.find_all().await.unwrap();
        let mut ctx = RequestContext::fresh();

        let wrong_id = RawInput::new().with_text("_token", ctx.csrf_token("delete6"));
        let other_session =
            RawInput::new().with_text("_token", RequestContext::fresh().csrf_token("delete5"));
        for input in [wrong_id, other_session, RawInput::new()] {
            let outcome = f.service.delete(&mut ctx, 5, input).await.unwrap();
            assert!(matches!(outcome, Outcome::Redirect(INDEX_PATH)));
        }

        assert_eq!(f.repository.find_all().await.unwrap(), before);
        let flashes = ctx.take_flashes();
        assert_eq!(flashes.len(), 3);
        assert!(flashes
            .iter()
            .all(|f| f.level == FlashLevel::Error && f.message == MSG_INVALID_CSRF));
    }

    #[tokio::test]
    async fn test_delete_missing_product() {
        let f = fixture();
        let mut ctx = RequestContext::fresh();
        let input = RawInput::new().with_text("_token", ctx.csrf_token("delete9"));
        let err = f.service.delete(&mut ctx, 9, input).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }
}
