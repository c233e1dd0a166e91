/*
 * The contents of this file are subject to the terms of the
 * Common Development and Distribution License, Version 1.0 only
 * (the "License").  You may not use this file except in compliance
 * with the License.
 *
 * See the file LICENSE in this distribution for details.
 * A copy of the CDDL is also available via the Internet at
 * http://www.opensource.org/licenses/cddl1.txt
 *
 * When distributing Covered Code, include this CDDL HEADER in each
 * file and include the contents of the LICENSE file from this
 * distribution.
 */

// Mirror Down Loader
// - error.rs file -

use thiserror::Error;

/// Errors a site definition can run into while extracting a page.
///
/// They travel inside `anyhow::Error`; callers that care (the dispatch loop
/// in `main.rs`) can still `downcast_ref` them.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Unable to download webpage {0}: HTTP Error 404: Not Found")]
    NotFound(String),

    #[error("HTTP Error {code} while fetching {url}")]
    HttpStatus { url: String, code: u16 },

    #[error("mirrordl could not find a site definition that would satisfy {0}")]
    Unsupported(String),

    #[error("{0}: Video unavailable, no formats were found on any mirror")]
    NoFormats(String),

    #[error("Too many redirects while resolving {0}")]
    RedirectLoop(String),
}
