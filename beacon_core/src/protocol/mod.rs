/*!
 * Protocol layer: data structures, constants, and the collector address.
 *
 * Everything related to *what* we send:
 * - `category`: item types and the rate-limit categories they map to
 * - `envelope`: the multi-item envelope and its wire serialization
 * - `event`: message events and user feedback payloads
 * - `constants`: SDK identity, header names, defaults
 * - `dsn`: DSN parsing and endpoint derivation
 */

pub mod category;
pub mod constants;
pub mod dsn;
pub mod envelope;
pub mod event;
