//! Main chat turn: short-circuit routes (cart checkout, cart add,
//! recommend gate) run before the classify→table→answer pipeline, and
//! the navigation resolver runs last over the finished answer.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use refit_intent::response_template;

use crate::cart;
use crate::handlers::internal_error;
use crate::navigation::{self, MemberCookie, NavigationHint, PaymentMethod};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterRequest {
    pub message: String,
    #[serde(default)]
    pub is_logged_in: bool,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub member_cookie: Option<MemberCookie>,
}

#[derive(Debug, Serialize)]
pub struct FilterResponse {
    pub response: String,
    pub navigation: Option<NavigationHint>,
}

pub async fn filter_message(
    State(state): State<Arc<AppState>>,
    Json(request): Json<FilterRequest>,
) -> Result<Json<FilterResponse>, (StatusCode, String)> {
    let message = request.message.as_str();
    let token = request.access_token.as_deref().filter(|t| !t.is_empty());

    // Whole-cart checkout: answered without touching the model.
    if navigation::is_cart_purchase(message) {
        if !request.is_logged_in {
            return Ok(Json(FilterResponse {
                response: navigation::LOGIN_PROMPT.to_string(),
                navigation: Some(NavigationHint {
                    show_button: true,
                    button_text: "로그인 페이지로 이동".to_string(),
                    button_url: "/member/login".to_string(),
                    login_required: true,
                }),
            }));
        }

        let response = match navigation::detect_payment_method(message) {
            PaymentMethod::Card => {
                "장바구니 상품을 카드로 구매하시겠습니까? 결제 페이지로 이동합니다."
            }
            PaymentMethod::Point => {
                "장바구니 상품을 적립금으로 구매하시겠습니까? 적립금 결제 페이지로 이동합니다."
            }
            PaymentMethod::Unspecified => {
                "장바구니 상품을 구매하시겠습니까? 결제 페이지로 이동합니다."
            }
        };
        let nav = navigation::resolve(
            message,
            request.is_logged_in,
            token,
            request.member_cookie.as_ref(),
        );
        return Ok(Json(FilterResponse {
            response: nav.response_override.unwrap_or_else(|| response.to_string()),
            navigation: Some(nav.hint),
        }));
    }

    // Cart add: the flow produces its own guidance text and never gets a
    // navigation button.
    if navigation::is_cart_add(message) {
        let cart_token = if request.is_logged_in { token } else { None };
        let response =
            cart::handle_cart_add(state.model.as_ref(), state.catalog.as_ref(), message, cart_token)
                .await
                .map_err(internal_error)?;
        return Ok(Json(FilterResponse {
            response,
            navigation: None,
        }));
    }

    // Personalized recommendation: gate on auth and body measurements.
    if navigation::is_recommend_request(message) {
        let access = navigation::check_recommend_access(token, request.member_cookie.as_ref());
        let button_text = if access.can_access {
            "추천 페이지로 이동"
        } else {
            "메인 페이지로 이동"
        };
        return Ok(Json(FilterResponse {
            response: access.message.clone(),
            navigation: Some(NavigationHint::button(button_text, access.redirect_to)),
        }));
    }

    // Main pipeline: classify, pick a table, answer grounded in its data.
    let intent = state.classifier.classify(message).await.map_err(internal_error)?;
    let tables = state.store.list_tables().await.map_err(internal_error)?;
    let pick = state
        .classifier
        .select_table(message, &intent, &tables)
        .await
        .map_err(internal_error)?;

    let (table, frame) = match state.store.read_table(&pick).await {
        Some(frame) if !frame.is_empty() => (pick, frame),
        _ => {
            info!(table = %pick, "selected table empty or absent, falling back to products");
            (
                "products".to_string(),
                state.store.read_table("products").await.unwrap_or_default(),
            )
        }
    };

    let system_prompt = format!(
        "{}\n\n참고할 DB 정보:\n{}\n\n\
         만약 욕을 하거나 상품과 관련없는 정보를 물어보면\n\
         '해당 정보는 답변드릴 수 없습니다' 라고 회신해.",
        response_template(&intent),
        frame.to_prompt_text()
    );
    let answer = state
        .model
        .complete(&system_prompt, message)
        .await
        .map_err(internal_error)?;

    state.chat_log.append(intent.label(), &table, message, &answer);

    let nav = navigation::resolve(
        message,
        request.is_logged_in,
        token,
        request.member_cookie.as_ref(),
    );
    Ok(Json(FilterResponse {
        response: nav.response_override.unwrap_or(answer),
        navigation: Some(nav.hint),
    }))
}
