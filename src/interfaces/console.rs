use crate::domain::order::OrderId;
use crate::domain::product::Product;
use std::io::{self, BufRead, Write};

/// Asks the player to confirm `order_id` and returns their answer.
///
/// Stands in for the Steam overlay dialog. Anything but `y`/`yes` (including end of
/// input) counts as a refusal.
pub fn confirm_purchase<R: BufRead, W: Write>(
    mut input: R,
    mut output: W,
    order_id: OrderId,
    product: &Product,
) -> io::Result<bool> {
    write!(
        output,
        "Authorize purchase of '{}' ({}) for order {order_id}? [y/N] ",
        product.description, product.category
    )?;
    output.flush()?;

    let mut answer = String::new();
    if input.read_line(&mut answer)? == 0 {
        return Ok(false);
    }
    let answer = answer.trim().to_ascii_lowercase();
    Ok(answer == "y" || answer == "yes")
}
