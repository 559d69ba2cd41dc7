pub mod errors;
mod models;

use std::time::Duration;
use log::error;
use reqwest::Client;
use crate::extractor::ExtractedForecast;
use crate::manager_gemini::errors::GeminiError;
use crate::manager_gemini::models::{
    Content, GenerateRequest, GenerateResponse, GenerationConfig, Part,
};

const GEMINI_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-pro:generateContent";

/// Delivered instead of a generated answer whenever the model call fails,
/// so the user always gets some message back
pub const FALLBACK_MESSAGE: &str = "🚨 AI가 행동 지침 생성에 실패했습니다.";

/// Struct for turning an extracted forecast into a "what to do" message
/// via the generative-language API
pub struct Gemini {
    client: Client,
    api_key: String,
}

impl Gemini {
    pub fn new(api_key: &str) -> Result<Gemini, GeminiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self { client, api_key: api_key.to_string() })
    }

    /// Generates the final message for one forecast. Never fails: any model
    /// error, empty or blocked response degrades to the fixed fallback text.
    ///
    /// # Arguments
    ///
    /// * 'data' - the matched and derived forecast
    /// * 'location_name' - display label of the subscriber's location
    pub async fn policy_message(&self, data: &ExtractedForecast, location_name: &str) -> String {
        let prompt = build_prompt(data, location_name);
        match self.generate(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                error!("generative call failed: {}", e);
                FALLBACK_MESSAGE.to_string()
            }
        }
    }

    async fn generate(&self, prompt: &str) -> Result<String, GeminiError> {
        let body = GenerateRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part { text: prompt.to_string() }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.8,
                max_output_tokens: 1024,
            },
        };

        let resp = self.client
            .post(GEMINI_URL)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(GeminiError::Api(format!("generateContent returned {}", status)));
        }

        let parsed: GenerateResponse = resp.json().await?;
        let text = parsed.candidates
            .and_then(|mut c| if c.is_empty() { None } else { Some(c.remove(0)) })
            .and_then(|c| c.content)
            .and_then(|c| c.parts)
            .and_then(|mut p| if p.is_empty() { None } else { Some(p.remove(0)) })
            .and_then(|p| p.text)
            .ok_or_else(|| GeminiError::Document("empty or blocked response".to_string()))?;

        Ok(text.trim().to_string())
    }
}

/// Assembles the role prompt from the forecast data. Range and wind-chill
/// lines are only present when those metrics exist for the day.
///
/// # Arguments
///
/// * 'data' - the matched and derived forecast
/// * 'location_name' - display label of the subscriber's location
pub fn build_prompt(data: &ExtractedForecast, location_name: &str) -> String {
    let sky_text = match data.sky.as_deref() {
        Some("1") => "맑음",
        Some("3") => "구름많음",
        _ => "흐림",
    };
    let precip_text = match data.precip_type.as_deref() {
        Some("0") => "없음",
        Some("1") => "비",
        Some("2") => "비/눈",
        Some("3") => "소나기",
        _ => "알 수 없음",
    };
    let precip_prob_text = data.precip_prob
        .map(|p| p.to_string())
        .unwrap_or_else(|| "-".to_string());

    let range_text = data.daily_range
        .map(|r| format!("(오늘 일교차: {:.1}℃)", r))
        .unwrap_or_default();
    let chill_text = data.apparent_temp
        .map(|c| format!("(체감 온도: {:.1}℃)", c))
        .unwrap_or_default();

    format!(
        "당신은 날씨 데이터를 분석해 \"그래서 뭘 해야 하는지\"만 알려주는 '날씨 알리미'입니다. \
         어투는 '방금 막 기상한 이들이 기분 좋게 받아들일 수 있는 정도'로 해주세요.\n\
         [예보 데이터]\n\
         - 위치: {location}\n\
         - 시간: {label}\n\
         - 현재 기온: {temp}℃\n\
         - 하늘 상태: {sky}\n\
         - 강수 형태: {precip}\n\
         - 강수 확률: {prob}%\n\
         - {range}\n\
         - {chill}\n\
         규칙:\n\
         1. {location}의 사용자가 {label}에 참고해야 할 구체적인 행동 지침(우산, 활동)과 옷차림(상의/하의)을 먼저 제시하세요.\n\
         2. [체감온도/일교차 반영] '체감 온도'나 '일교차' 정보가 있다면, 옷차림 추천 시 꼭 반영하세요.\n\
         3. [옷차림 이모지] 옷차림 추천 시 🧥, 👕, 👖 같은 이모지를 사용하세요.\n\
         4. [날씨 설명] 행동 지침 제시 후, 한 줄 띄우고 {location}의 날씨 요약을 간략히 설명하세요.\n\
         5. [날씨 이모지] 날씨 요약 끝에 날씨를 표현하는 ☀️, ☁️, 🌧️ 같은 이모지 1개를 붙여주세요.",
        location = location_name,
        label = data.forecast_label,
        temp = data.temp,
        sky = sky_text,
        precip = precip_text,
        prob = precip_prob_text,
        range = range_text,
        chill = chill_text,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forecast() -> ExtractedForecast {
        ExtractedForecast {
            temp: 3.5,
            precip_prob: Some(60),
            precip_type: Some("1".to_string()),
            sky: Some("3".to_string()),
            wind_speed: Some(2.5),
            daily_min: Some(-2.0),
            daily_max: Some(3.5),
            daily_range: Some(5.5),
            apparent_temp: Some(0.2),
            forecast_label: "9시".to_string(),
        }
    }

    #[test]
    fn prompt_carries_codes_as_text() {
        let prompt = build_prompt(&forecast(), "서울");
        assert!(prompt.contains("위치: 서울"));
        assert!(prompt.contains("시간: 9시"));
        assert!(prompt.contains("하늘 상태: 구름많음"));
        assert!(prompt.contains("강수 형태: 비"));
        assert!(prompt.contains("강수 확률: 60%"));
    }

    #[test]
    fn optional_lines_appear_only_when_derived() {
        let prompt = build_prompt(&forecast(), "서울");
        assert!(prompt.contains("일교차: 5.5℃"));
        assert!(prompt.contains("체감 온도: 0.2℃"));

        let mut bare = forecast();
        bare.daily_range = None;
        bare.apparent_temp = None;
        let prompt = build_prompt(&bare, "서울");
        // the fixed rules section still names both metrics, only the
        // data lines must disappear
        assert!(!prompt.contains("일교차: "));
        assert!(!prompt.contains("체감 온도: "));
    }

    #[test]
    fn unknown_codes_fall_back_to_neutral_text() {
        let mut odd = forecast();
        odd.sky = Some("9".to_string());
        odd.precip_type = None;
        let prompt = build_prompt(&odd, "서울");
        assert!(prompt.contains("하늘 상태: 흐림"));
        assert!(prompt.contains("강수 형태: 알 수 없음"));
    }
}
