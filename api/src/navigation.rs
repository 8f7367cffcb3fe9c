//! Keyword-driven navigation hints for the support chat.
//!
//! Resolution is a strict priority ladder: login gate, cart purchase,
//! recommend gate, product-recommendation shortcuts, then general page
//! shortcuts. The resolver never edits the answer text itself; when a
//! gate wants to replace it, the replacement travels in
//! [`Navigation::response_override`] and the caller applies it.

use serde::{Deserialize, Serialize};

/// Phrases that name an action requiring an authenticated member.
const LOGIN_REQUIRED_KEYWORDS: &[&str] = &[
    "구매",
    "상품 구매",
    "결제",
    "장바구니 담기",
    "상품 담기",
    "기부",
    "기부하기",
    "리뷰 쓰기",
    "후기 작성",
    "마이페이지",
    "주문내역",
    "적립금",
    "포인트 확인",
];

/// Whole-cart checkout phrases. Checked before the cart-add keywords so
/// "장바구니 구매" routes to checkout, not to the item-add flow.
const CART_PURCHASE_KEYWORDS: &[&str] = &[
    "장바구니에 있는 상품 구매",
    "장바구니 상품 구매",
    "장바구니 구매",
    "장바구니 상품 카드로 구매",
    "장바구니 상품 적립금으로 구매",
    "장바구니 카드로 구매",
    "장바구니 적립금으로 구매",
];

const CART_ADD_KEYWORDS: &[&str] = &["장바구니", "담기", "담아줘", "추가", "넣어줘"];

const RECOMMEND_KEYWORDS: &[&str] = &[
    "추천",
    "추천 페이지",
    "추천 상품",
    "개인 추천",
    "맞춤 추천",
    "체형",
    "체형에 맞는",
    "내 체형",
    "키에 맞는",
    "몸무게에 맞는",
    "신체",
    "신체에 맞는",
    "사이즈",
    "사이즈에 맞는",
    "맞는 옷",
    "어울리는",
    "어울리는 옷",
    "체형별",
    "신체별",
    "개인별",
];

const CARD_KEYWORDS: &[&str] = &[
    "카드",
    "카드로",
    "카드 결제",
    "신용카드",
    "체크카드",
    "카드로 구매",
    "카드로 결제",
];

const POINT_KEYWORDS: &[&str] = &[
    "적립금",
    "적립금으로",
    "포인트",
    "포인트로",
    "적립금으로 구매",
    "포인트로 구매",
    "적립금으로 결제",
    "포인트로 결제",
];

/// (keyword, button text, url) — checked before the general table.
const PRODUCT_RECOMMEND_NAV: &[(&str, &str, &str)] = &[
    ("평점 높은", "상품 상세보기", "/product/1"),
    ("가장 싼", "상품 상세보기", "/product/1"),
    ("인기 상품", "상품 상세보기", "/product/1"),
    ("브랜드 추천", "브랜드 상품 보기", "/main/brand"),
];

/// General page shortcuts, in match-priority order ("브랜드 상품" must
/// come before the bare "브랜드").
const GENERAL_NAV: &[(&str, &str, &str)] = &[
    ("구매", "구매 페이지로 이동", "/order/payment"),
    ("장바구니", "장바구니로 이동", "/cart"),
    ("마이페이지", "마이페이지로 이동", "/member/mypage"),
    ("주문내역", "주문내역으로 이동", "/order/order-list"),
    ("상품 상세", "상품 상세보기", "/product/1"),
    ("브랜드 상품", "브랜드 상품 보기", "/main/brand"),
    ("브랜드", "브랜드 페이지로 이동", "/main/brand"),
    ("NEW", "NEW 페이지로 이동", "/main/new"),
    ("랭킹", "랭킹 페이지로 이동", "/main/ranking"),
    ("세일", "세일 페이지로 이동", "/main/sale"),
    ("나눔", "나눔 페이지로 이동", "/sharing"),
    ("커뮤니티", "커뮤니티로 이동", "/boards"),
];

pub const LOGIN_PROMPT: &str = "로그인이 필요한 서비스입니다. 먼저 로그인해주세요.";

/// Member profile carried in the session cookie. Height/weight are zero
/// when the member never entered them.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct MemberCookie {
    #[serde(default)]
    pub member: Option<MemberInfo>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct MemberInfo {
    #[serde(default)]
    pub height: f64,
    #[serde(default)]
    pub weight: f64,
}

/// Button payload rendered by the chat widget.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NavigationHint {
    pub show_button: bool,
    pub button_text: String,
    pub button_url: String,
    pub login_required: bool,
}

impl NavigationHint {
    pub fn none() -> Self {
        Self {
            show_button: false,
            button_text: String::new(),
            button_url: String::new(),
            login_required: false,
        }
    }

    pub fn button(text: &str, url: &str) -> Self {
        Self {
            show_button: true,
            button_text: text.to_string(),
            button_url: url.to_string(),
            login_required: false,
        }
    }
}

/// Resolver output: the hint plus an optional replacement for the answer
/// text already produced upstream.
#[derive(Debug, Clone, PartialEq)]
pub struct Navigation {
    pub hint: NavigationHint,
    pub response_override: Option<String>,
}

impl Navigation {
    fn hint_only(hint: NavigationHint) -> Self {
        Self {
            hint,
            response_override: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentMethod {
    Card,
    Point,
    Unspecified,
}

/// Card keywords win over point keywords when both appear.
pub fn detect_payment_method(message: &str) -> PaymentMethod {
    if CARD_KEYWORDS.iter().any(|k| message.contains(k)) {
        PaymentMethod::Card
    } else if POINT_KEYWORDS.iter().any(|k| message.contains(k)) {
        PaymentMethod::Point
    } else {
        PaymentMethod::Unspecified
    }
}

pub fn requires_login(message: &str) -> bool {
    LOGIN_REQUIRED_KEYWORDS.iter().any(|k| message.contains(k))
}

pub fn is_cart_purchase(message: &str) -> bool {
    CART_PURCHASE_KEYWORDS.iter().any(|k| message.contains(k))
}

pub fn is_cart_add(message: &str) -> bool {
    !is_cart_purchase(message) && CART_ADD_KEYWORDS.iter().any(|k| message.contains(k))
}

pub fn is_recommend_request(message: &str) -> bool {
    RECOMMEND_KEYWORDS.iter().any(|k| message.contains(k))
}

/// Outcome of the personalized-recommendation gate.
#[derive(Debug, Clone, PartialEq)]
pub struct RecommendAccess {
    pub can_access: bool,
    pub message: String,
    pub redirect_to: &'static str,
}

/// The recommend page needs a logged-in member with body measurements on
/// file. Checks run in order: token, readable cookie, measurements.
pub fn check_recommend_access(
    access_token: Option<&str>,
    member_cookie: Option<&MemberCookie>,
) -> RecommendAccess {
    if access_token.map_or(true, |t| t.is_empty()) {
        return RecommendAccess {
            can_access: false,
            message: "추천 페이지는 로그인이 필요한 서비스입니다. 먼저 로그인해주세요."
                .to_string(),
            redirect_to: "/main",
        };
    }

    let member = member_cookie.and_then(|c| c.member.as_ref());
    let Some(member) = member else {
        return RecommendAccess {
            can_access: false,
            message: "로그인 정보를 확인할 수 없습니다. 다시 로그인해주세요.".to_string(),
            redirect_to: "/main",
        };
    };

    if member.height <= 0.0 || member.weight <= 0.0 {
        return RecommendAccess {
            can_access: false,
            message: "추천 서비스를 이용하려면 신체정보(키, 몸무게)를 입력해주세요. \
                      회원정보 수정 페이지에서 입력하실 수 있습니다."
                .to_string(),
            redirect_to: "/member/modify",
        };
    }

    RecommendAccess {
        can_access: true,
        message: "사용자 체형에 맞는 상품을 추천해드리겠습니다. 추천 페이지로 이동합니다."
            .to_string(),
        redirect_to: "/main/recommend",
    }
}

pub fn resolve(
    message: &str,
    is_logged_in: bool,
    access_token: Option<&str>,
    member_cookie: Option<&MemberCookie>,
) -> Navigation {
    // 1. Login gate. Replaces the answer text outright.
    if requires_login(message) && !is_logged_in {
        return Navigation {
            hint: NavigationHint {
                show_button: true,
                button_text: "로그인 페이지로 이동".to_string(),
                button_url: "/member/login".to_string(),
                login_required: true,
            },
            response_override: Some(LOGIN_PROMPT.to_string()),
        };
    }

    // 2. Whole-cart checkout, with the payment method baked into the URL.
    if is_cart_purchase(message) {
        let (text, url) = match detect_payment_method(message) {
            PaymentMethod::Card => (
                "장바구니 전체 선택 후 카드 결제",
                "/cart?selectAll=true&goToPayment=true&paymentMethod=card",
            ),
            PaymentMethod::Point => (
                "장바구니 전체 선택 후 적립금 결제",
                "/cart?selectAll=true&goToPayment=true&paymentMethod=point",
            ),
            PaymentMethod::Unspecified => (
                "장바구니 전체 선택 후 구매",
                "/cart?selectAll=true&goToPayment=true",
            ),
        };
        return Navigation::hint_only(NavigationHint::button(text, url));
    }

    // 3. Personalized-recommendation gate.
    if is_recommend_request(message) {
        let access = check_recommend_access(access_token, member_cookie);
        return if access.can_access {
            Navigation::hint_only(NavigationHint::button(
                "추천 페이지로 이동",
                access.redirect_to,
            ))
        } else {
            Navigation {
                hint: NavigationHint::button("메인 페이지로 이동", access.redirect_to),
                response_override: Some(access.message),
            }
        };
    }

    // 4. Product-recommendation shortcuts.
    for (keyword, text, url) in PRODUCT_RECOMMEND_NAV {
        if message.contains(keyword) {
            return Navigation::hint_only(NavigationHint::button(text, url));
        }
    }

    // 5. General page shortcuts.
    for (keyword, text, url) in GENERAL_NAV {
        if message.contains(keyword) {
            return Navigation::hint_only(NavigationHint::button(text, url));
        }
    }

    // 6. Nothing matched.
    Navigation::hint_only(NavigationHint::none())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(height: f64, weight: f64) -> MemberCookie {
        MemberCookie {
            member: Some(MemberInfo { height, weight }),
        }
    }

    #[test]
    fn test_login_gate_outranks_cart_purchase() {
        // "장바구니 구매" contains the login keyword "구매"; logged out,
        // the login gate must win and override the answer.
        let nav = resolve("장바구니 구매", false, None, None);
        assert!(nav.hint.login_required);
        assert_eq!(nav.hint.button_url, "/member/login");
        assert_eq!(nav.response_override.as_deref(), Some(LOGIN_PROMPT));
    }

    #[test]
    fn test_cart_purchase_payment_urls() {
        let token = Some("tok");
        let cookie = member(170.0, 65.0);

        let nav = resolve("장바구니 카드로 구매", true, token, Some(&cookie));
        assert_eq!(
            nav.hint.button_url,
            "/cart?selectAll=true&goToPayment=true&paymentMethod=card"
        );

        let nav = resolve("장바구니 적립금으로 구매", true, token, Some(&cookie));
        assert_eq!(
            nav.hint.button_url,
            "/cart?selectAll=true&goToPayment=true&paymentMethod=point"
        );

        let nav = resolve("장바구니 구매", true, token, Some(&cookie));
        assert_eq!(nav.hint.button_url, "/cart?selectAll=true&goToPayment=true");
        assert!(nav.response_override.is_none());
    }

    #[test]
    fn test_card_wins_over_point() {
        assert_eq!(
            detect_payment_method("카드 아니면 적립금으로"),
            PaymentMethod::Card
        );
        assert_eq!(detect_payment_method("포인트로 살래"), PaymentMethod::Point);
        assert_eq!(detect_payment_method("그냥 살래"), PaymentMethod::Unspecified);
    }

    #[test]
    fn test_recommend_gate_failures() {
        let no_token = check_recommend_access(None, None);
        assert!(!no_token.can_access);
        assert_eq!(no_token.redirect_to, "/main");

        let no_cookie = check_recommend_access(Some("tok"), None);
        assert!(!no_cookie.can_access);
        assert!(no_cookie.message.contains("로그인 정보"));

        let no_body = check_recommend_access(Some("tok"), Some(&member(0.0, 65.0)));
        assert!(!no_body.can_access);
        assert_eq!(no_body.redirect_to, "/member/modify");

        let ok = check_recommend_access(Some("tok"), Some(&member(170.0, 65.0)));
        assert!(ok.can_access);
        assert_eq!(ok.redirect_to, "/main/recommend");
    }

    #[test]
    fn test_general_nav_order() {
        let cookie = member(170.0, 65.0);
        // "브랜드 상품" must match before the bare "브랜드".
        let nav = resolve("브랜드 상품 보여줘", true, Some("tok"), Some(&cookie));
        assert_eq!(nav.hint.button_text, "브랜드 상품 보기");

        let nav = resolve("브랜드 페이지 어디야", true, Some("tok"), Some(&cookie));
        assert_eq!(nav.hint.button_text, "브랜드 페이지로 이동");
    }

    #[test]
    fn test_general_nav_button_labels() {
        let cookie = member(170.0, 65.0);
        let cases = [
            ("주문내역 좀 볼게", "주문내역으로 이동", "/order/order-list"),
            ("NEW 들어온 거 있어?", "NEW 페이지로 이동", "/main/new"),
            ("랭킹 보여줘", "랭킹 페이지로 이동", "/main/ranking"),
            ("세일 중인 거 있어?", "세일 페이지로 이동", "/main/sale"),
        ];
        for (message, text, url) in cases {
            let nav = resolve(message, true, Some("tok"), Some(&cookie));
            assert_eq!(nav.hint.button_text, text, "{}", message);
            assert_eq!(nav.hint.button_url, url, "{}", message);
        }
    }

    #[test]
    fn test_no_match_yields_no_button() {
        let nav = resolve("오늘 기분이 좋아", true, None, None);
        assert!(!nav.hint.show_button);
        assert!(nav.response_override.is_none());
    }

    #[test]
    fn test_cart_add_excludes_purchase_phrases() {
        assert!(is_cart_add("나이키 에어맥스 장바구니에 담아줘"));
        assert!(!is_cart_add("장바구니 상품 구매"));
    }
}
