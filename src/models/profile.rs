use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{Role, SubscriptionPlan};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub name: String,
    pub age: u32,
    pub dob: String,
    pub gender: String,
    pub phone: String,
    /// National identity number. Masked before it leaves the device.
    pub national_id: String,
    pub health_id: String,
    pub blood_group: String,
    pub role: Role,
    #[serde(default)]
    pub specialization: Option<String>,
    #[serde(default)]
    pub license_number: Option<String>,
    #[serde(default)]
    pub visiting_hours: Option<VisitingHours>,
    #[serde(default)]
    pub notification_settings: NotificationSettings,
    #[serde(default)]
    pub emergency_contact: Option<EmergencyContact>,
    #[serde(default)]
    pub profile_picture: Option<String>,
    #[serde(default)]
    pub is_premium: bool,
    #[serde(default)]
    pub subscription_plan: Option<SubscriptionPlan>,
    #[serde(default)]
    pub subscription_expiry: Option<String>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSettings {
    pub email: bool,
    pub sms: bool,
    pub push: bool,
    pub sound: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            email: true,
            sms: true,
            push: true,
            sound: true,
        }
    }
}

/// Notification channel, used to toggle one setting at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationChannel {
    Email,
    Sms,
    Push,
    Sound,
}

impl NotificationSettings {
    pub fn toggle(&mut self, channel: NotificationChannel) {
        let flag = match channel {
            NotificationChannel::Email => &mut self.email,
            NotificationChannel::Sms => &mut self.sms,
            NotificationChannel::Push => &mut self.push,
            NotificationChannel::Sound => &mut self.sound,
        };
        *flag = !*flag;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitingHours {
    pub start: String,
    pub end: String,
    pub days: Vec<String>,
}

impl Default for VisitingHours {
    fn default() -> Self {
        Self {
            start: "09:00".into(),
            end: "17:00".into(),
            days: ["Mon", "Tue", "Wed", "Thu", "Fri"]
                .iter()
                .map(|d| d.to_string())
                .collect(),
        }
    }
}

impl VisitingHours {
    /// Add the day if absent, remove it if present.
    pub fn toggle_day(&mut self, day: &str) {
        if let Some(pos) = self.days.iter().position(|d| d == day) {
            self.days.remove(pos);
        } else {
            self.days.push(day.to_string());
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyContact {
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub relation: Option<String>,
}
