//! Domain records shared by the store and the HTTP layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// A login identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
}

/// A tracked person. Several users may be managed from one account.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: i64,
    pub name: Option<String>,
    pub surname: Option<String>,
    pub gender: Option<i32>,
    pub avatar: Option<String>,
    pub height: Option<i32>,
    #[serde(rename = "birthOfDate")]
    pub birth_of_date: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields accepted when creating a user.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewUser {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub surname: Option<String>,
    #[serde(default)]
    pub gender: Option<i32>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub height: Option<i32>,
    #[serde(default, rename = "birthOfDate")]
    pub birth_of_date: Option<String>,
}

/// Partial update of a user.
///
/// An absent field is left alone, an explicit `null` clears it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(from = "UserPatchBody")]
pub struct UserPatch {
    pub name: Option<Option<String>>,
    pub surname: Option<Option<String>>,
    pub gender: Option<Option<i32>>,
    pub avatar: Option<Option<String>>,
    pub height: Option<Option<i32>>,
    pub birth_of_date: Option<Option<String>>,
}

/// Wire shape of a patch. Both birth date spellings are accepted; when a body
/// carries both, `birth_of_date` wins.
#[derive(Deserialize)]
struct UserPatchBody {
    #[serde(default, deserialize_with = "nullable")]
    name: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    surname: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    gender: Option<Option<i32>>,
    #[serde(default, deserialize_with = "nullable")]
    avatar: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    height: Option<Option<i32>>,
    #[serde(default, deserialize_with = "nullable")]
    birth_of_date: Option<Option<String>>,
    #[serde(default, rename = "birthOfDate", deserialize_with = "nullable")]
    birth_of_date_camel: Option<Option<String>>,
}

impl From<UserPatchBody> for UserPatch {
    fn from(body: UserPatchBody) -> Self {
        Self {
            name: body.name,
            surname: body.surname,
            gender: body.gender,
            avatar: body.avatar,
            height: body.height,
            birth_of_date: body.birth_of_date.or(body.birth_of_date_camel),
        }
    }
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.surname.is_none()
            && self.gender.is_none()
            && self.avatar.is_none()
            && self.height.is_none()
            && self.birth_of_date.is_none()
    }

    /// Apply the patch, returning whether anything was set.
    pub fn apply(self, user: &mut User) -> bool {
        if self.is_empty() {
            return false;
        }
        if let Some(v) = self.name {
            user.name = v;
        }
        if let Some(v) = self.surname {
            user.surname = v;
        }
        if let Some(v) = self.gender {
            user.gender = v;
        }
        if let Some(v) = self.avatar {
            user.avatar = v;
        }
        if let Some(v) = self.height {
            user.height = v;
        }
        if let Some(v) = self.birth_of_date {
            user.birth_of_date = v;
        }
        true
    }
}

fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// One dated body-metric entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserMetric {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub user_id: i64,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub height: i32,
    #[serde(default)]
    pub bmi: f64,
    #[serde(default)]
    pub weight_diff: Option<f64>,
    #[serde(default)]
    pub body_metric: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// A one-time password reset code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetToken {
    pub id: i64,
    pub account_id: i64,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
}
