//! Inputs, outputs and prompts of the three delegate operations.

use crate::error::{Error, ErrorType};
use crate::model::decimal_from_f64;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

pub const BREAKDOWN: &str = "breakdown";
pub const EXTRACT_PRODUCT_INFO: &str = "extractProductInfo";
pub const SUGGEST_DAILY_TASKS: &str = "suggestDailyTasks";

pub const DEFAULT_SUGGESTION_COUNT: u32 = 3;

/// The subtasks of a larger task, in the order they should be done.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Breakdown {
    pub subtasks: Vec<String>,
}

/// What a product page says about the product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInfo {
    pub name: String,
    pub price: Decimal,
    pub image_url: String,
}

/// The shape the completion service is asked to produce for `ProductInfo`.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub(super) struct ProductInfoOutput {
    name: String,
    /// Price in the page's currency, without symbols.
    price: f64,
    /// Absolute URL of the main product image.
    image_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DailySuggestions {
    pub suggestions: Vec<String>,
}

pub(super) fn breakdown_prompt(task_description: &str) -> Result<String, Error> {
    let task = task_description.trim();
    if task.is_empty() {
        return Err(Error::validation("The task description is empty"));
    }
    Ok(format!(
        "Break the following task down into a short list of concrete, actionable subtasks. \
        Keep each subtask to one sentence and list them in the order they should be done.\n\n\
        Task: {task}"
    ))
}

/// Accepts only absolute http and https URLs.
pub(super) fn parse_product_url(product_url: &str) -> Result<Url, Error> {
    let url = Url::parse(product_url.trim()).map_err(|e| {
        Error::new(ErrorType::Validation, e).context_msg(format!(
            "'{product_url}' is not a valid product URL"
        ))
    })?;
    match url.scheme() {
        "http" | "https" if url.host().is_some() => Ok(url),
        scheme => Err(Error::validation(format!(
            "The product URL must use http or https, not '{scheme}'"
        ))),
    }
}

pub(super) fn product_prompt(url: &Url) -> String {
    format!(
        "Look at the product page at {url} and report the product's name, its current price as a \
        plain number, and the absolute URL of its main image."
    )
}

pub(super) fn check_product(output: ProductInfoOutput) -> Result<ProductInfo, String> {
    if output.name.trim().is_empty() {
        return Err("the product name is empty".to_string());
    }
    let price = decimal_from_f64(output.price)
        .ok_or_else(|| format!("the price {} is not a number", output.price))?;
    if price.is_sign_negative() && !price.is_zero() {
        return Err(format!("the price {price} is negative"));
    }
    let image_url = Url::parse(&output.image_url)
        .map_err(|e| format!("the image URL '{}' is not absolute: {e}", output.image_url))?;
    Ok(ProductInfo {
        name: output.name,
        price,
        image_url: image_url.to_string(),
    })
}

pub(super) fn suggestion_prompt(historical_tasks: &str, count: Option<u32>) -> Result<String, Error> {
    let count = count.unwrap_or(DEFAULT_SUGGESTION_COUNT);
    if count == 0 {
        return Err(Error::validation("The suggestion count must be at least 1"));
    }
    let history: Value = serde_json::from_str(historical_tasks).map_err(|e| {
        Error::new(ErrorType::MalformedInput, e)
            .context_msg("The historical tasks are not valid JSON")
    })?;
    Ok(format!(
        "Here are tasks the user has worked on before, as JSON:\n{history}\n\n\
        Suggest {count} tasks the user is likely to want to do today. Return exactly {count} \
        short task titles, most important first."
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_url_checks() {
        assert!(parse_product_url("https://shop.example.com/p/42").is_ok());
        assert!(parse_product_url("http://shop.example.com").is_ok());
        for bad in ["not-a-url", "", "ftp://example.com/x", "mailto:me@example.com", "/p/42"] {
            let e = parse_product_url(bad).unwrap_err();
            assert_eq!(e.error_type(), ErrorType::Validation, "{bad}");
        }
    }

    #[test]
    fn test_suggestion_prompt_checks() {
        let e = suggestion_prompt("{not json", None).unwrap_err();
        assert_eq!(e.error_type(), ErrorType::MalformedInput);

        let e = suggestion_prompt("[]", Some(0)).unwrap_err();
        assert_eq!(e.error_type(), ErrorType::Validation);

        let prompt = suggestion_prompt(r#"[{"title":"Run"}]"#, None).unwrap();
        assert!(prompt.contains("Suggest 3 tasks"));
        assert!(prompt.contains("Run"));
    }

    #[test]
    fn test_breakdown_prompt_requires_text() {
        assert_eq!(
            breakdown_prompt("   ").unwrap_err().error_type(),
            ErrorType::Validation
        );
        assert!(breakdown_prompt("Plan a move").unwrap().contains("Plan a move"));
    }

    #[test]
    fn test_check_product() {
        let ok = check_product(ProductInfoOutput {
            name: "Kettle".into(),
            price: 24.99,
            image_url: "https://cdn.example.com/kettle.jpg".into(),
        })
        .unwrap();
        assert_eq!(ok.price.to_string(), "24.99");

        assert!(check_product(ProductInfoOutput {
            name: "Kettle".into(),
            price: -1.0,
            image_url: "https://cdn.example.com/kettle.jpg".into(),
        })
        .is_err());

        assert!(check_product(ProductInfoOutput {
            name: "Kettle".into(),
            price: 3.0,
            image_url: "kettle.jpg".into(),
        })
        .is_err());
    }
}
