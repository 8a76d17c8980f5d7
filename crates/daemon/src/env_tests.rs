// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

const DEFAULT: Duration = Duration::from_secs(7);

#[yare::parameterized(
    unset = { None, DEFAULT },
    empty = { Some(""), DEFAULT },
    garbage = { Some("soon"), DEFAULT },
    negative = { Some("-5"), DEFAULT },
    plain = { Some("250"), Duration::from_millis(250) },
    padded = { Some(" 1500 "), Duration::from_millis(1500) },
    zero = { Some("0"), Duration::ZERO },
)]
fn millis_values(value: Option<&str>, expected: Duration) {
    assert_eq!(parse_millis(value, DEFAULT), expected);
}
