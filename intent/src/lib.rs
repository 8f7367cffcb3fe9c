//! Intent classification and table selection for Refit support turns.
//!
//! The intent set is closed: every user message maps to one of the known
//! labels or to [`Intent::Other`], the explicit unmapped arm. Lookup
//! tables over the enum are total functions — `Other` always has a
//! default branch, never a silent `None`.

use anyhow::Result;
use refit_llm::ChatModel;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// What a user message is asking for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Product details, price, size, brand
    ProductInfo,
    /// Order, payment, or cart status
    OrderStatus,
    /// Complaints, exchanges, refunds
    CustomerService,
    /// Login, account, site malfunction
    TechnicalSupport,
    /// What the Refit platform is
    SiteIntroduction,
    /// Anything without a clearer label
    GeneralInquiry,
    /// Clothing donation program
    DonationInfo,
    /// Reviews and ratings
    ReviewInfo,
    /// Membership, points, profile
    MemberInfo,
    /// Community boards and comments
    BoardInfo,
    /// Unrecognized classifier output, kept verbatim
    Other(String),
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl Intent {
    /// Parse a classifier label. Unknown labels become `Other` so the
    /// caller can still run the general-inquiry path with them.
    pub fn from_label(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "product_info" => Intent::ProductInfo,
            "order_status" => Intent::OrderStatus,
            "customer_service" => Intent::CustomerService,
            "technical_support" => Intent::TechnicalSupport,
            "site_introduction" => Intent::SiteIntroduction,
            "general_inquiry" => Intent::GeneralInquiry,
            "donation_info" => Intent::DonationInfo,
            "review_info" => Intent::ReviewInfo,
            "member_info" => Intent::MemberInfo,
            "board_info" => Intent::BoardInfo,
            other => Intent::Other(other.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Intent::ProductInfo => "product_info",
            Intent::OrderStatus => "order_status",
            Intent::CustomerService => "customer_service",
            Intent::TechnicalSupport => "technical_support",
            Intent::SiteIntroduction => "site_introduction",
            Intent::GeneralInquiry => "general_inquiry",
            Intent::DonationInfo => "donation_info",
            Intent::ReviewInfo => "review_info",
            Intent::MemberInfo => "member_info",
            Intent::BoardInfo => "board_info",
            Intent::Other(s) => s,
        }
    }

    /// Tables most likely to answer this intent, in preference order.
    /// The unmapped arm falls back to every known table.
    pub fn candidate_tables(&self, all_tables: &[String]) -> Vec<String> {
        let fixed: &[&str] = match self {
            Intent::ProductInfo => &[
                "products",
                "product_options",
                "product_images",
                "product_thumbnails",
                "brands",
                "categories",
                "categories_sub",
            ],
            Intent::OrderStatus => &[
                "orders",
                "order_items",
                "payments",
                "carts",
                "cart_items",
                "products",
                "product_options",
            ],
            Intent::CustomerService => &[
                "products",
                "brands",
                "reviews",
                "review_images",
                "review_likes",
                "boards",
                "comments",
                "replies",
                "member",
            ],
            Intent::TechnicalSupport => &[
                "products",
                "product_images",
                "member",
                "member_point",
                "member_roles",
            ],
            Intent::SiteIntroduction => &[
                "products",
                "categories",
                "brands",
                "donation_products",
                "member",
                "reviews",
            ],
            Intent::GeneralInquiry => &["products", "categories", "brands"],
            Intent::DonationInfo => &[
                "donation_products",
                "donation_options",
                "donation_images",
                "member",
                "member_point",
            ],
            Intent::ReviewInfo => &[
                "reviews",
                "review_images",
                "review_likes",
                "products",
                "member",
            ],
            Intent::MemberInfo => &["member", "member_point", "member_roles", "carts", "orders"],
            Intent::BoardInfo => &["boards", "board_images", "comments", "replies", "member"],
            Intent::Other(_) => return all_tables.to_vec(),
        };
        fixed.iter().map(|s| s.to_string()).collect()
    }
}

/// System prompt for the closed-set intent classifier.
const INTENT_ANALYSIS_PROMPT: &str = r#"너는 Refit 의류 거래 플랫폼 챗봇의 의도 분석기야.
사용자 메시지를 아래 의도 중 정확히 하나로 분류해줘.

- product_info: 상품 정보, 가격, 사이즈, 브랜드 문의
- order_status: 주문, 결제, 장바구니 상태 문의
- customer_service: 불만, 교환, 환불, 고객 응대
- technical_support: 로그인, 계정, 사이트 오류
- site_introduction: Refit 플랫폼 소개, 서비스 설명
- general_inquiry: 그 외 일반 문의
- donation_info: 의류 기부, 나눔 관련 문의
- review_info: 리뷰, 평점, 후기 문의
- member_info: 회원 정보, 적립금, 등급 문의
- board_info: 커뮤니티 게시판, 댓글 문의

의도 이름만 반환해줘. 예시: product_info"#;

/// Per-intent answer templates for the tabular question answerer.
/// `Other` always resolves to the general template.
pub fn response_template(intent: &Intent) -> &'static str {
    match intent {
        Intent::ProductInfo => {
            "너는 Refit 플랫폼의 상품 안내 챗봇이야.\n\
             제공된 DB 정보에 있는 상품, 가격, 사이즈, 브랜드 정보만 사용해서 답변해.\n\
             확인되지 않은 상품 정보는 \"정확한 정보 확인 후 안내드리겠습니다\"라고 답변해.\n\
             답변은 2~3문장으로 간결하게 작성해."
        }
        Intent::OrderStatus => {
            "너는 Refit 플랫폼의 주문 안내 챗봇이야.\n\
             제공된 DB 정보를 바탕으로 주문, 결제, 장바구니 상태를 안내해.\n\
             개인 주문 상세는 마이페이지의 주문내역에서 확인하도록 안내해.\n\
             답변은 2~3문장으로 간결하게 작성해."
        }
        Intent::CustomerService => {
            "너는 Refit 플랫폼의 고객상담 챗봇이야.\n\
             교환, 환불, 불만 사항은 친절하게 공감하며 안내해.\n\
             확인되지 않은 정보는 \"정확한 정보 확인 후 안내드리겠습니다\"라고 답변해.\n\
             답변은 2~3문장으로 간결하게 작성해."
        }
        Intent::TechnicalSupport => {
            "너는 Refit 플랫폼의 기술 지원 챗봇이야.\n\
             로그인, 계정, 사이트 오류 문의에 단계별 해결 방법을 안내해.\n\
             해결되지 않으면 고객센터 문의를 안내해.\n\
             답변은 2~3문장으로 간결하게 작성해."
        }
        Intent::SiteIntroduction => {
            "너는 Refit 플랫폼의 소개 챗봇이야.\n\
             Refit이 \"지속가능한 패션을 위한 중고 의류 거래 플랫폼\"이라는 점을 강조해.\n\
             환경 보호와 의류 재활용에 대한 내용도 포함해.\n\
             DB 정보는 참고용으로만 사용하고, 사이트 소개에 집중해.\n\
             답변은 2~3문단 이내로, 줄바꿈으로 보기 좋게 정리해."
        }
        Intent::DonationInfo => {
            "너는 Refit 플랫폼의 기부 안내 챗봇이야.\n\
             제공된 DB 정보를 바탕으로 의류 기부와 나눔 절차를 안내해.\n\
             답변은 2~3문장으로 간결하게 작성해."
        }
        Intent::ReviewInfo => {
            "너는 Refit 플랫폼의 리뷰 안내 챗봇이야.\n\
             제공된 DB 정보에 있는 리뷰와 평점 정보만 사용해서 답변해.\n\
             답변은 2~3문장으로 간결하게 작성해."
        }
        Intent::MemberInfo => {
            "너는 Refit 플랫폼의 회원 안내 챗봇이야.\n\
             회원 등급, 적립금, 프로필 관련 문의에 답변해.\n\
             개인정보는 절대 노출하지 말고, 마이페이지에서 확인하도록 안내해.\n\
             답변은 2~3문장으로 간결하게 작성해."
        }
        Intent::BoardInfo => {
            "너는 Refit 플랫폼의 커뮤니티 안내 챗봇이야.\n\
             제공된 DB 정보를 바탕으로 게시판과 댓글 이용 방법을 안내해.\n\
             답변은 2~3문장으로 간결하게 작성해."
        }
        Intent::GeneralInquiry | Intent::Other(_) => {
            "너는 Refit 플랫폼의 고객상담 챗봇이야.\n\
             Refit은 지속가능한 패션을 위한 의류 거래 플랫폼입니다.\n\
             고객 질문에 친절하고 정확하게 답변하세요.\n\
             확인되지 않은 정보는 \"정확한 정보 확인 후 안내드리겠습니다\"라고 답변하세요.\n\
             답변은 2~3문장으로 간결하게 작성하세요."
        }
    }
}

/// Model-backed intent classifier and table selector.
pub struct IntentClassifier {
    model: Arc<dyn ChatModel>,
}

impl IntentClassifier {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    /// Classify one user message. Model failures propagate — there is no
    /// retry and no heuristic fallback on this path.
    pub async fn classify(&self, text: &str) -> Result<Intent> {
        let response = self.model.complete(INTENT_ANALYSIS_PROMPT, text).await?;
        let intent = Intent::from_label(clean_label(&response));
        debug!(intent = %intent, "classified user message");
        Ok(intent)
    }

    /// Ask the model for the one table most likely to answer `text`.
    ///
    /// The trimmed response is returned verbatim, without checking that it
    /// names a real table — callers must re-check existence and fall back
    /// to `products` when the pick is empty or absent.
    pub async fn select_table(
        &self,
        text: &str,
        intent: &Intent,
        all_tables: &[String],
    ) -> Result<String> {
        let candidates = intent.candidate_tables(all_tables);

        let prompt = format!(
            "사용자 질문: {}\n\
             분석된 의도: {}\n\
             관련 가능한 테이블: {}\n\
             전체 DB 테이블: {}\n\n\
             위 질문을 해결하기 위해 가장 적합한 테이블을 선택해주세요.\n\
             테이블 이름만 반환해주세요. 예시: products",
            text,
            intent,
            candidates.join(", "),
            all_tables.join(", "),
        );

        let response = self.model.complete(&prompt, text).await?;
        let table = clean_label(&response).to_string();
        debug!(intent = %intent, table, "selected table");
        Ok(table)
    }
}

/// Strip markdown fences and quote wrapping from a model label response.
fn clean_label(response: &str) -> &str {
    response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
        .trim_matches(|c| c == '\'' || c == '"' || c == '`')
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use refit_llm::{ChatModel, LlmError};

    struct FixedModel(String);

    #[async_trait]
    impl ChatModel for FixedModel {
        async fn complete(
            &self,
            _system_prompt: &str,
            _user_text: &str,
        ) -> std::result::Result<String, LlmError> {
            Ok(self.0.clone())
        }
    }

    fn all_tables() -> Vec<String> {
        ["products", "orders", "reviews", "member"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn test_label_parsing() {
        assert_eq!(Intent::from_label("product_info"), Intent::ProductInfo);
        assert_eq!(Intent::from_label("  Donation_Info "), Intent::DonationInfo);
        assert_eq!(
            Intent::from_label("weather_chat"),
            Intent::Other("weather_chat".into())
        );
    }

    #[test]
    fn test_mapped_intents_have_candidates() {
        let tables = all_tables();
        for intent in [
            Intent::ProductInfo,
            Intent::OrderStatus,
            Intent::CustomerService,
            Intent::TechnicalSupport,
            Intent::SiteIntroduction,
            Intent::GeneralInquiry,
            Intent::DonationInfo,
            Intent::ReviewInfo,
            Intent::MemberInfo,
            Intent::BoardInfo,
        ] {
            assert!(
                !intent.candidate_tables(&tables).is_empty(),
                "{} has no candidates",
                intent
            );
        }
    }

    #[test]
    fn test_unmapped_intent_falls_back_to_all_tables() {
        let tables = all_tables();
        let intent = Intent::Other("weather_chat".into());
        assert_eq!(intent.candidate_tables(&tables), tables);
    }

    #[tokio::test]
    async fn test_classify_trims_and_parses() {
        let classifier = IntentClassifier::new(Arc::new(FixedModel("\n`review_info`\n".into())));
        let intent = classifier.classify("평점 어때?").await.unwrap();
        assert_eq!(intent, Intent::ReviewInfo);
    }

    #[tokio::test]
    async fn test_select_table_returns_verbatim_pick() {
        let classifier = IntentClassifier::new(Arc::new(FixedModel("'ghost_table'".into())));
        let table = classifier
            .select_table("뭐가 있어?", &Intent::ProductInfo, &all_tables())
            .await
            .unwrap();
        // No existence validation here; the caller re-checks and falls back.
        assert_eq!(table, "ghost_table");
    }

    #[test]
    fn test_other_uses_general_template() {
        let general = response_template(&Intent::GeneralInquiry);
        assert_eq!(response_template(&Intent::Other("hm".into())), general);
    }
}
