pub mod finance;
pub mod input_data;

pub use finance::{FinanceError, annuity, equivalent_periodical_costs};
pub use input_data::{InputData, load_input_data};
