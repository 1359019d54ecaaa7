mod common;
mod routing;
mod signing;
