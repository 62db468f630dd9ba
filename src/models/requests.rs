use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Request to classify a business
///
/// Fields are read-only once constructed; use the builder-style `with_*`
/// methods to produce a new request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ClassificationRequest {
    #[validate(length(max = 512), custom(function = "not_blank"))]
    #[serde(rename = "businessName", alias = "business_name")]
    business_name: String,
    #[serde(default)]
    description: String,
    #[validate(custom(function = "http_url"))]
    #[serde(rename = "websiteURL", alias = "websiteUrl", alias = "website_url", default)]
    website_url: Option<String>,
    #[validate(custom(function = "iso_region"))]
    #[serde(rename = "declaredRegion", alias = "declared_region", default)]
    declared_region: Option<String>,
}

impl ClassificationRequest {
    pub fn new(business_name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            business_name: business_name.into(),
            description: description.into(),
            website_url: None,
            declared_region: None,
        }
    }

    pub fn with_website(mut self, url: impl Into<String>) -> Self {
        self.website_url = Some(url.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.declared_region = Some(region.into());
        self
    }

    pub fn business_name(&self) -> &str {
        &self.business_name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn website_url(&self) -> Option<&str> {
        self.website_url.as_deref()
    }

    pub fn declared_region(&self) -> Option<&str> {
        self.declared_region.as_deref()
    }

    /// Trimmed copy with blank optional fields dropped and the region upper-cased
    pub fn normalized(&self) -> Self {
        let non_blank = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        Self {
            business_name: self.business_name.trim().to_string(),
            description: self.description.trim().to_string(),
            website_url: non_blank(&self.website_url),
            declared_region: non_blank(&self.declared_region).map(|r| r.to_ascii_uppercase()),
        }
    }

    /// Business name and description joined as one evidence text
    pub fn business_text(&self) -> String {
        if self.description.trim().is_empty() {
            self.business_name.trim().to_string()
        } else {
            format!("{} {}", self.business_name.trim(), self.description.trim())
        }
    }
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

fn http_url(value: &str) -> Result<(), ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(());
    }
    match url::Url::parse(trimmed) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") && parsed.host_str().is_some() => Ok(()),
        _ => Err(ValidationError::new("url")),
    }
}

fn iso_region(value: &str) -> Result<(), ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() || (trimmed.len() == 2 && trimmed.chars().all(|c| c.is_ascii_alphabetic())) {
        Ok(())
    } else {
        Err(ValidationError::new("region"))
    }
}
