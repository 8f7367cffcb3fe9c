//! Conversational cart-add flow: extract what the user wants, find the
//! product, pick a size with stock, then commit through the catalog API.
//!
//! Every dead end returns Korean guidance text instead of an error; the
//! only failure that propagates is a model outage during extraction.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use tracing::{debug, info, warn};

use catalog::{CartAddRequest, CatalogApi, Product};
use refit_llm::ChatModel;

const SEARCH_PAGE: u32 = 0;
const SEARCH_SIZE: u32 = 10;
const DEFAULT_SIZE: &str = "L";

const EXTRACT_PROMPT: &str = r#"사용자의 장바구니 요청에서 상품명, 사이즈, 수량을 추출해줘.

규칙:
- 상품명: 브랜드와 모델명을 합친 전체 상품명 (예: "나이키 에어맥스")
- 사이즈: S, M, L, XL 등. 언급이 없으면 "L"
- 수량: 숫자. 언급이 없으면 1
- "장바구니", "담아줘" 같은 요청 표현은 상품명에서 제외해

JSON 형식으로만 응답해:
{"product_name": "상품명", "size": "L", "quantity": 1}

예시:
- "나이키 에어맥스 장바구니에 담아줘" → {"product_name": "나이키 에어맥스", "size": "L", "quantity": 1}
- "아디다스 후드티 M사이즈 2개 추가" → {"product_name": "아디다스 후드티", "size": "M", "quantity": 2}"#;

/// What the extraction model read out of the user's message.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct OrderIntent {
    #[serde(default)]
    pub product_name: String,
    #[serde(default = "default_size")]
    pub size: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

impl Default for OrderIntent {
    fn default() -> Self {
        Self {
            product_name: String::new(),
            size: default_size(),
            quantity: default_quantity(),
        }
    }
}

fn default_size() -> String {
    DEFAULT_SIZE.to_string()
}

fn default_quantity() -> u32 {
    1
}

/// Run the extraction prompt. Malformed model output falls back to the
/// empty intent (which the caller turns into "say the product name
/// again"); a model outage propagates.
pub async fn extract_order_intent(
    model: &dyn ChatModel,
    message: &str,
) -> Result<OrderIntent> {
    let response = model
        .complete(EXTRACT_PROMPT, message)
        .await
        .context("order extraction failed")?;

    let cleaned = clean_json(&response);
    match serde_json::from_str::<OrderIntent>(cleaned) {
        Ok(order) => {
            debug!(?order, "extracted order intent");
            Ok(order)
        }
        Err(e) => {
            warn!(error = %e, raw = %response, "order extraction returned invalid JSON");
            Ok(OrderIntent::default())
        }
    }
}

fn clean_json(response: &str) -> &str {
    response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

/// Relevance of one candidate against the search keyword. Exact match
/// beats prefix beats substring beats shared words.
pub fn score_match(keyword: &str, product_name: &str) -> u32 {
    let keyword = keyword.to_lowercase();
    let name = product_name.to_lowercase();

    let mut score = if name == keyword {
        100
    } else if name.starts_with(&keyword) {
        50
    } else if name.contains(&keyword) {
        30
    } else {
        let keyword_words: HashSet<&str> = keyword.split_whitespace().collect();
        let name_words: HashSet<&str> = name.split_whitespace().collect();
        10 * keyword_words.intersection(&name_words).count() as u32
    };

    if keyword.contains('-') && name.contains(keyword.replace('-', " ").trim()) {
        score += 20;
    }

    score
}

/// Highest-scoring candidate; first-seen wins ties. `None` when every
/// candidate scored zero, so the raw result set survives for the
/// disambiguation prompt.
fn best_match<'p>(keyword: &str, products: &'p [Product]) -> Option<&'p Product> {
    let mut best: Option<(&Product, u32)> = None;
    for product in products {
        let score = score_match(keyword, &product.product_name);
        if best.map_or(true, |(_, top)| score > top) {
            best = Some((product, score));
        }
    }
    best.filter(|(_, score)| *score > 0).map(|(p, _)| p)
}

/// Search the catalog with progressively looser keywords, stopping at the
/// first pass that returns anything: the name as given, hyphens as
/// spaces, word windows for long names, then the single longest word.
pub async fn search_product(catalog: &dyn CatalogApi, product_name: &str) -> Vec<Product> {
    let mut keywords: Vec<String> = vec![product_name.to_string()];

    if product_name.contains('-') {
        keywords.push(product_name.replace('-', " ").trim().to_string());
    }

    let words: Vec<&str> = product_name.split_whitespace().collect();
    if words.len() > 2 {
        keywords.push(words[..2].join(" "));
        keywords.push(words[words.len() - 2..].join(" "));
        keywords.push(format!("{} {}", words[0], words[words.len() - 1]));
    }
    if words.len() > 1 {
        let longest = words
            .iter()
            .copied()
            .fold("", |acc, w| if w.chars().count() > acc.chars().count() { w } else { acc });
        keywords.push(longest.to_string());
    }

    for keyword in &keywords {
        let products = catalog
            .search_products(keyword, SEARCH_PAGE, SEARCH_SIZE)
            .await;
        if products.is_empty() {
            continue;
        }

        debug!(keyword = %keyword, hits = products.len(), "search pass hit");
        return match best_match(keyword, &products) {
            Some(best) => vec![best.clone()],
            None => products,
        };
    }

    Vec::new()
}

/// Full cart-add conversation turn. Returns the Korean reply text.
pub async fn handle_cart_add(
    model: &dyn ChatModel,
    catalog: &dyn CatalogApi,
    message: &str,
    access_token: Option<&str>,
) -> Result<String> {
    let order = extract_order_intent(model, message).await?;
    if order.product_name.is_empty() {
        return Ok("상품명을 찾을 수 없습니다. 다시 말씀해 주세요.".to_string());
    }

    let matches = search_product(catalog, &order.product_name).await;
    if matches.is_empty() {
        return Ok(format!(
            "'{}' 상품을 찾을 수 없습니다. 다른 상품명으로 다시 말씀해 주세요.",
            order.product_name
        ));
    }
    if matches.len() > 1 {
        let names: Vec<&str> = matches
            .iter()
            .take(3)
            .map(|p| p.product_name.as_str())
            .collect();
        return Ok(format!(
            "여러 상품이 검색되었습니다: {}\n더 구체적으로 말씀해 주세요.",
            names.join(", ")
        ));
    }

    let product = &matches[0];
    let options = catalog.product_options(product.product_id).await;

    // Requested size first; fall back to L when it has stock.
    let mut substituted = false;
    let mut option = options
        .iter()
        .find(|o| o.size == order.size && o.stock > 0);
    if option.is_none() && order.size != DEFAULT_SIZE {
        option = options.iter().find(|o| o.size == DEFAULT_SIZE && o.stock > 0);
        substituted = option.is_some();
    }

    let Some(option) = option else {
        let available: Vec<&str> = options
            .iter()
            .filter(|o| o.stock > 0)
            .map(|o| o.size.as_str())
            .collect();
        return Ok(if available.is_empty() {
            format!("'{}' 상품은 현재 모든 사이즈가 품절입니다.", product.product_name)
        } else {
            format!(
                "'{}' 사이즈는 현재 품절입니다. 사용 가능한 사이즈: {}",
                order.size,
                available.join(", ")
            )
        });
    };

    if i64::from(order.quantity) > option.stock {
        return Ok(format!(
            "현재 재고가 부족합니다. 최대 {}개까지 담을 수 있습니다.",
            option.stock
        ));
    }

    // Auth comes last so logged-out users still get the full guidance
    // about names, sizes, and stock.
    let Some(token) = access_token else {
        return Ok("로그인이 필요한 서비스입니다. 먼저 로그인 후 이용해 주세요.".to_string());
    };

    let request = CartAddRequest {
        product_id: product.product_id,
        option_id: option.id,
        quantity: order.quantity,
        cart_item_id: None,
    };
    if !catalog.add_to_cart(&request, token).await {
        return Ok("장바구니 담기에 실패했습니다. 다시 시도해 주세요.".to_string());
    }

    info!(
        product_id = product.product_id,
        size = %option.size,
        quantity = order.quantity,
        "cart add committed"
    );

    let confirmation = format!(
        "'{}' {}사이즈 {}개가 장바구니에 담겼습니다! 🛒",
        product.product_name, option.size, order.quantity
    );
    Ok(if substituted {
        format!(
            "'{}' 사이즈는 품절되어 {} 사이즈로 담았습니다. {}",
            order.size, DEFAULT_SIZE, confirmation
        )
    } else {
        confirmation
    })
}
