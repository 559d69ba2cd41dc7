use serde::Deserialize;
use serde_json::Value;

/// One gateway frame. 'd' stays untyped until the opcode says what it is.
#[derive(Deserialize)]
pub struct GatewayPayload {
    pub op: u8,
    pub d: Option<Value>,
    pub s: Option<u64>,
    pub t: Option<String>,
}

#[derive(Deserialize)]
pub struct Hello {
    pub heartbeat_interval: u64,
}

#[derive(Deserialize)]
pub struct Interaction {
    pub id: String,
    pub token: String,
    pub data: Option<InteractionData>,
    pub member: Option<Member>,
    pub user: Option<User>,
}

#[derive(Deserialize)]
pub struct InteractionData {
    pub name: String,
}

#[derive(Deserialize)]
pub struct Member {
    pub user: Option<User>,
}

#[derive(Deserialize, Clone)]
pub struct User {
    pub id: String,
    pub username: Option<String>,
}

#[derive(Deserialize)]
pub struct GuildMemberAdd {
    pub user: Option<User>,
}

#[derive(Deserialize)]
pub struct DmChannel {
    pub id: String,
}

impl Interaction {
    /// The invoking user, whether the command came from a guild or a DM
    pub fn invoker(&self) -> Option<&User> {
        self.member
            .as_ref()
            .and_then(|m| m.user.as_ref())
            .or(self.user.as_ref())
    }
}
