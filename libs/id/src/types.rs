//! Typed ID definitions for lockbox resources.

use crate::define_id;

// Tenancy
define_id!(ProjectId, "prj");
define_id!(TeamId, "team");
define_id!(UserId, "usr");

// Secrets
define_id!(SecretId, "sec");

// Events and requests
define_id!(EventId, "evt");
define_id!(RequestId, "req");
