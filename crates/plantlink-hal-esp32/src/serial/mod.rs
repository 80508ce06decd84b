pub mod line_uart;
