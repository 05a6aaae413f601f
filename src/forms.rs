//! Post and comment submissions and their field-level validation.

use serde::Deserialize;

use crate::db::models::Group;
use crate::media::MediaStore;

pub const REQUIRED: &str = "This field is required.";
pub const INVALID_GROUP: &str = "Select a valid choice. That choice is not one of the available choices.";
pub const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

/// Per-field error messages; an empty value means the form is valid.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormErrors {
    pub text: Option<String>,
    pub group: Option<String>,
    pub image: Option<String>,
}

impl FormErrors {
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.group.is_none() && self.image.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub data: Vec<u8>,
}

/// Raw post form as submitted, before validation.
#[derive(Debug, Clone, Default)]
pub struct PostSubmission {
    pub text: String,
    /// Group slug; empty means no group.
    pub group: String,
    pub image: Option<Upload>,
}

/// A post form that passed validation.
#[derive(Debug)]
pub struct ValidPost<'a> {
    pub text: String,
    pub group_id: Option<i64>,
    pub image: Option<&'a Upload>,
}

impl PostSubmission {
    pub fn validate<'a>(&'a self, groups: &[Group]) -> Result<ValidPost<'a>, FormErrors> {
        let mut errors = FormErrors::default();

        let text = self.text.trim();
        if text.is_empty() {
            errors.text = Some(REQUIRED.to_string());
        }

        let slug = self.group.trim();
        let group_id = if slug.is_empty() {
            None
        } else {
            match groups.iter().find(|g| g.slug == slug) {
                Some(group) => Some(group.id),
                None => {
                    errors.group = Some(INVALID_GROUP.to_string());
                    None
                }
            }
        };

        if let Some(upload) = &self.image {
            if upload.data.is_empty() || !MediaStore::is_image(&upload.filename) {
                errors.image = Some(INVALID_IMAGE.to_string());
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(ValidPost {
            text: text.to_string(),
            group_id,
            image: self.image.as_ref(),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    pub text: String,
}

impl CommentForm {
    pub fn validate(&self) -> Result<String, FormErrors> {
        let text = self.text.trim();
        if text.is_empty() {
            return Err(FormErrors {
                text: Some(REQUIRED.to_string()),
                ..FormErrors::default()
            });
        }
        Ok(text.to_string())
    }
}
