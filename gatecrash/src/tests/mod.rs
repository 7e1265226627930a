pub mod mock_page;

mod scripts_tests;
