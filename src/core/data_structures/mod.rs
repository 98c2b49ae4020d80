/*!
 * Data Structures
 *
 * Small value types shared by every scheduler component.
 */

mod inline_string;

pub use inline_string::InlineString;
