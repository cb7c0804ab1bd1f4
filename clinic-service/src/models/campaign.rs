//! Outreach campaigns. Composition only; delivery happens elsewhere.

use super::datetime_to_timestamp;
use crate::grpc::proto;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CampaignType {
    Email,
    Sms,
}

impl CampaignType {
    pub fn from_proto(value: i32) -> Option<Self> {
        match proto::CampaignType::try_from(value).ok()? {
            proto::CampaignType::Unspecified => None,
            proto::CampaignType::Email => Some(Self::Email),
            proto::CampaignType::Sms => Some(Self::Sms),
        }
    }

    pub fn to_proto(self) -> i32 {
        let kind = match self {
            Self::Email => proto::CampaignType::Email,
            Self::Sms => proto::CampaignType::Sms,
        };
        kind as i32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    Draft,
    Scheduled,
    Sent,
    Failed,
}

impl CampaignStatus {
    pub fn to_proto(self) -> i32 {
        let status = match self {
            Self::Draft => proto::CampaignStatus::Draft,
            Self::Scheduled => proto::CampaignStatus::Scheduled,
            Self::Sent => proto::CampaignStatus::Sent,
            Self::Failed => proto::CampaignStatus::Failed,
        };
        status as i32
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Campaign {
    pub id: i64,
    pub company_id: i64,
    pub name: String,
    pub campaign_type: CampaignType,
    pub subject: Option<String>,
    pub message: String,
    pub status: CampaignStatus,
    pub scheduled_date: Option<DateTime<Utc>>,
    pub sent_date: Option<DateTime<Utc>>,
    pub recipient_count: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Validate)]
pub struct NewCampaign {
    pub company_id: i64,
    #[validate(length(min = 1, max = 255, message = "Campaign name is required"))]
    pub name: String,
    pub campaign_type: CampaignType,
    #[validate(length(max = 255, message = "Subject is too long"))]
    pub subject: Option<String>,
    #[validate(length(min = 1, message = "Message is required"))]
    pub message: String,
    pub scheduled_date: Option<DateTime<Utc>>,
}

impl From<Campaign> for proto::Campaign {
    fn from(c: Campaign) -> Self {
        Self {
            id: c.id,
            company_id: c.company_id,
            name: c.name,
            campaign_type: c.campaign_type.to_proto(),
            subject: c.subject,
            message: c.message,
            status: c.status.to_proto(),
            scheduled_date: c.scheduled_date.map(datetime_to_timestamp),
            sent_date: c.sent_date.map(datetime_to_timestamp),
            recipient_count: c.recipient_count,
            created_at: Some(datetime_to_timestamp(c.created_at)),
        }
    }
}
