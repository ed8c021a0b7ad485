//! Audience evaluation.

use crate::device::{is_test_device, DeviceState};
use crate::{locale, version};
use inapp_types::{Audience, TagGroups};
use tracing::trace;

/// Returns true if the device matches the audience at display time.
///
/// A missing audience always matches. A non-empty test device list decides
/// the result on its own. The `new_user` condition is not checked here; see
/// [`matches_for_scheduling`]. Tag groups not present in `tag_groups` are
/// treated as empty.
pub fn matches(
    audience: Option<&Audience>,
    device: &DeviceState,
    tag_groups: Option<&TagGroups>,
) -> bool {
    let Some(audience) = audience else {
        return true;
    };

    if !audience.test_devices.is_empty() {
        return is_test_device(&audience.test_devices, device.channel_id.as_deref());
    }

    if audience
        .location_opt_in
        .is_some_and(|expected| expected != device.location_opted_in)
    {
        trace!("Audience miss: location opt-in");
        return false;
    }

    if audience
        .notifications_opt_in
        .is_some_and(|expected| expected != device.notifications_opted_in)
    {
        trace!("Audience miss: notification opt-in");
        return false;
    }

    if !locale::matches(&audience.language_tags, &device.locales) {
        trace!("Audience miss: locale {:?}", device.locales);
        return false;
    }

    if let Some(selector) = &audience.tags {
        let empty = TagGroups::new();
        if !selector.apply(&device.tags, tag_groups.unwrap_or(&empty)) {
            trace!("Audience miss: tag selector");
            return false;
        }
    }

    if let Some(predicate) = &audience.version {
        if !version::predicate_matches(predicate, device) {
            trace!("Audience miss: app version");
            return false;
        }
    }

    true
}

/// Returns true if a schedule for this audience may be created.
///
/// Checks the test device list and, when the audience sets `new_user`,
/// requires it to equal `allow_new_user`.
pub fn matches_for_scheduling(
    audience: Option<&Audience>,
    device: &DeviceState,
    allow_new_user: bool,
) -> bool {
    let Some(audience) = audience else {
        return true;
    };

    if !audience.test_devices.is_empty()
        && !is_test_device(&audience.test_devices, device.channel_id.as_deref())
    {
        return false;
    }

    audience
        .new_user
        .is_none_or(|new_user| new_user == allow_new_user)
}
