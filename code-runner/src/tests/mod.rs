mod utils;

mod process;
