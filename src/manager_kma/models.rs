use serde::Deserialize;

#[derive(Deserialize)]
pub struct Envelope {
    pub response: Response,
}

#[derive(Deserialize)]
pub struct Response {
    pub header: Header,
    pub body: Option<Body>,
}

#[derive(Deserialize)]
pub struct Header {
    #[serde(rename = "resultCode")]
    pub result_code: String,
    #[serde(rename = "resultMsg")]
    pub result_msg: String,
}

#[derive(Deserialize)]
pub struct Body {
    pub items: Option<Items>,
}

#[derive(Deserialize)]
pub struct Items {
    pub item: Option<Vec<Item>>,
}

#[derive(Deserialize)]
pub struct Item {
    #[serde(rename = "fcstDate")]
    pub fcst_date: String,
    #[serde(rename = "fcstTime")]
    pub fcst_time: String,
    pub category: String,
    #[serde(rename = "fcstValue")]
    pub fcst_value: String,
    pub nx: i32,
    pub ny: i32,
}
